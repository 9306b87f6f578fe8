//! 命令行工具: 对 nii 脊髓二值分割运行沿中线的横截面形态学分析,
//! 输出逐切片属性 CSV; 可选将角度校正后的工作切片存为 PNG 供质检.

use clap::{Parser, ValueEnum};
use cord_berry::centerline::FitConfig;
use cord_berry::fitting::CurveType;
use cord_berry::prelude::*;
use cord_berry::save_patch_vis;
use cord_berry::shape::{angle, ShapeConfig};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, about, version)]
struct Args {
    /// 输入的 nii 二值分割文件.
    input: PathBuf,

    /// 中线拟合算法.
    #[arg(short, long, value_enum, default_value_t = Algo::Hanning)]
    algo: Algo,

    /// 多项式拟合的次数 (仅 `--algo polynomial` 时生效).
    #[arg(short, long, default_value_t = 3)]
    degree: u32,

    /// Hann 平滑的窗口长度, 单位: 切片 (仅 `--algo hanning` 时生效).
    #[arg(short, long, default_value_t = 50)]
    window_length: usize,

    /// 输出 CSV 路径. 省略时写到标准输出.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 将每个处理切片的角度校正结果存为 PNG 的目录.
    #[arg(long)]
    dump_patches: Option<PathBuf>,

    /// 输出逐切片 debug 日志.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Algo {
    Polynomial,
    Spline,
    Hanning,
}

impl Args {
    fn fit_config(&self) -> FitConfig {
        let algo = match self.algo {
            Algo::Polynomial => CurveType::Polynomial {
                degree: self.degree,
            },
            Algo::Spline => CurveType::CubicSpline,
            Algo::Hanning => CurveType::Hanning {
                window_length: self.window_length,
            },
        };
        FitConfig { algo }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    simple_logger::SimpleLogger::new()
        .with_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init()
        .expect("日志初始化失败");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            log::error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    let seg = CordSeg::open(&args.input).map_err(|e| format!("打开 {:?} 失败: {e}", args.input))?;
    log::info!(
        "输入 {:?}: 形状 {:?}, 体素分辨率 {:?} mm",
        args.input,
        seg.shape(),
        seg.pix_dim()
    );
    if !seg.is_in_plane_isotropic() {
        log::warn!("横截面内体素分辨率各向异性, 形态学缩放按 width 方向近似");
    }

    let cfg = ShapeConfig {
        fit: args.fit_config(),
        verbose: args.verbose,
    };

    if let Some(dir) = &args.dump_patches {
        dump_patches(&seg, &cfg, dir)?;
    }

    let series = seg
        .shape_along_centerline(&cfg)
        .map_err(|e| format!("形态学分析失败: {e:?}"))?;

    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| format!("创建 {path:?} 失败: {e}"))?;
            write_csv(&series, std::io::BufWriter::new(file))
        }
        None => write_csv(&series, std::io::stdout().lock()),
    }
    .map_err(|e| format!("写出 CSV 失败: {e}"))
}

/// 每个深度位置一行; 缺失哨兵输出为 `NaN`.
fn write_csv<W: Write>(series: &PropertySeries, mut w: W) -> std::io::Result<()> {
    write!(w, "slice")?;
    for (p, _) in series.iter() {
        write!(w, ",{}", p.name())?;
    }
    writeln!(w)?;

    for iz in 0..series.len_z() {
        write!(w, "{iz}")?;
        for (_, arr) in series.iter() {
            write!(w, ",{}", arr[iz])?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// 将处理范围内每个切片的角度校正结果存为 `<目录>/patch_<iz>.png`.
fn dump_patches(seg: &CordSeg, cfg: &ShapeConfig, dir: &PathBuf) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("创建 {dir:?} 失败: {e}"))?;
    let ctl = seg
        .centerline(&cfg.fit)
        .map_err(|e| format!("中线拟合失败: {e:?}"))?;
    let Some((min_z, max_z)) = seg.nonzero_z_range() else {
        return Err("分割不含前景".into());
    };

    for iz in min_z..max_z.saturating_sub(1) {
        let Some(tangent) = angle::unit_tangent(ctl.deriv_at(iz), seg.pix_dim()) else {
            continue;
        };
        let patch = seg.slice_at(iz).to_patch();
        let corrected = angle::correct_patch(patch.view(), tangent);
        let path = dir.join(format!("patch_{iz}.png"));
        save_patch_vis(corrected.view(), &path).map_err(|e| format!("保存 {path:?} 失败: {e}"))?;
    }
    Ok(())
}
