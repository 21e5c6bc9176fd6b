/// mcpdnav 命令行入口
///
/// 子命令：
/// - split：从原始采集数据生成训练/测试/验证集
/// - evaluate：批量评估并输出误差表
/// - estimate：估计单个位置
/// - counts：统计采集文件中每个信标的行数

use clap::{Parser, Subcommand};
use mcpdnav::algorithms::{Datasets, Metric, WknnEstimator};
use mcpdnav::config::EvaluationConfig;
use mcpdnav::dataset::{count_beacon_lines, raw_measurements, read_raw_capture, split_datasets};
use mcpdnav::evaluation::Evaluator;
use mcpdnav::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcpdnav", version, about = "基于 RSSI / MCPD 指纹的 wkNN 定位评估")]
struct Cli {
    /// JSON 配置文件（缺省使用实验室布置）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 从原始采集数据生成训练/测试/验证集
    Split,
    /// 评估所有 k、度量与位置的组合
    Evaluate {
        /// 以 JSON 输出完整报告
        #[arg(long)]
        json: bool,
    },
    /// 估计单个位置
    Estimate {
        /// 位置编号
        #[arg(long)]
        point: u32,
        /// 近邻数
        #[arg(long, default_value_t = 3)]
        k: usize,
        /// 距离度量：euclidean 或 chebyshev
        #[arg(long, default_value = "euclidean")]
        metric: Metric,
        /// 原始采集文件，给出时对其中每次测量估计后求平均
        #[arg(long)]
        raw: Option<PathBuf>,
    },
    /// 统计采集文件中每个信标的行数
    Counts {
        /// 采集文件
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => EvaluationConfig::from_json_file(path)?,
        None => EvaluationConfig::default(),
    };

    match cli.command {
        Command::Split => {
            let summary = split_datasets(&config)?;
            println!(
                "训练样本: {}, 测试样本: {}, 验证样本: {}, 跳过行: {}",
                summary.train_samples,
                summary.test_samples,
                summary.validation_samples,
                summary.skipped_rows
            );
        }
        Command::Evaluate { json } => {
            let evaluator = load_evaluator(&config)?;
            let ids = config.room.all_position_ids();
            let report = evaluator.run(&config.ks, &config.metrics, &ids).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            for (k, metric) in report.combinations() {
                println!("{}", report.error_table(k, metric));
                if let Some(summary) = report.summary(k, metric) {
                    println!(
                        "RSSI 平均: {:.3} m, 方差: {:.3}, 标准差: {:.3}",
                        summary.signal.mean, summary.signal.variance, summary.signal.std_dev
                    );
                    println!(
                        "MCPD 平均: {:.3} m, 方差: {:.3}, 标准差: {:.3}\n",
                        summary.phase.mean, summary.phase.variance, summary.phase.std_dev
                    );
                }
            }
            for failure in &report.failures {
                println!("⚠️  {}: {}", failure.key, failure.message);
            }
        }
        Command::Estimate { point, k, metric, raw } => {
            let evaluator = load_evaluator(&config)?;
            let result = match raw {
                Some(path) => {
                    let (samples, _) = read_raw_capture(&path)?;
                    let measurements = raw_measurements(&samples, &config.room);
                    evaluator.estimate_repeated(k, point, metric, &measurements)?
                }
                None => evaluator.estimator().estimate_from_average(k, point, metric)?,
            };
            println!("{}", result);
        }
        Command::Counts { file } => {
            for (beacon, count) in count_beacon_lines(&file, &config.room)? {
                println!("{} ({}) 共 {} 行", beacon.id, beacon.index, count);
            }
        }
    }

    Ok(())
}

fn load_evaluator(config: &EvaluationConfig) -> Result<Evaluator> {
    let datasets = Datasets::load(config)?;
    Ok(Evaluator::new(WknnEstimator::new(config.room.clone(), datasets)))
}
