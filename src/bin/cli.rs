use anyhow::{anyhow, bail, Context, Result};
use studycam::analysis::HttpAnalysisClient;
use studycam::config::StudyCamConfig;
use studycam::notify::{FanOut, LogBook, LogNotifier, Notifier};
use studycam::pipeline::{CaptureOutcome, Pipeline, PipelineParts, PreviewSink};
use studycam::platform::{list_devices, NokhwaBackend};
use studycam::quality::evaluate_image;
use studycam::types::Frame;
use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

fn main() -> Result<()> {
    studycam::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{} {}", studycam::NAME, studycam::VERSION);
        eprintln!("Usage: studycam <list-devices|check|run|--version> [args]");
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "--version" | "-V" => {
            println!("{} {}", studycam::NAME, studycam::VERSION);
            Ok(())
        }
        "list-devices" => cmd_list_devices(&args),
        "check" => cmd_check(&args),
        "run" => cmd_run(&args),
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

fn cmd_list_devices(args: &[String]) -> Result<()> {
    let devices = list_devices()?;
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&devices)?);
    } else if devices.is_empty() {
        println!("No cameras found");
    } else {
        for d in devices {
            println!("{}: {} ({})", d.index, d.name, d.description);
        }
    }
    Ok(())
}

/// check <image> [--config <path>] [--json]
fn cmd_check(args: &[String]) -> Result<()> {
    let mut path = None;
    let mut config_path = None;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(value_at(args, i, "--config")?));
            }
            "--json" => json = true,
            other => path = Some(PathBuf::from(other)),
        }
        i += 1;
    }

    let path = path.ok_or_else(|| anyhow!("Usage: studycam check <image> [--json]"))?;
    let config = load_config(config_path)?;
    let image = image::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    let report = evaluate_image(&image, &config.thresholds())?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{}: {} (sharpness {:.1}, brightness {:.1})",
            path.display(),
            if report.passed { "PASS" } else { "FAIL" },
            report.sharpness,
            report.brightness
        );
    }
    Ok(())
}

/// run [--device N] [--interval S] [--auto] [--config <path>] [--save]
fn cmd_run(args: &[String]) -> Result<()> {
    let mut config_path = None;
    let mut device = None;
    let mut interval = None;
    let mut auto = false;
    let mut save = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--device" => {
                i += 1;
                device = Some(value_at(args, i, "--device")?.parse::<u32>()?);
            }
            "--interval" => {
                i += 1;
                interval = Some(value_at(args, i, "--interval")?.to_string());
            }
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(value_at(args, i, "--config")?));
            }
            "--auto" => auto = true,
            "--save" => save = true,
            other => bail!("Unknown option: {}", other),
        }
        i += 1;
    }

    let path = config_path.unwrap_or_else(StudyCamConfig::default_path);
    let mut config = StudyCamConfig::load_from_file(&path)?;
    if let Some(index) = device {
        config.camera.device_index = index;
    }
    if auto {
        config.capture.auto_capture = true;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let log_book = Arc::new(LogBook::default());
    let notifier: Arc<dyn Notifier> = Arc::new(
        FanOut::new()
            .with(Arc::new(LogNotifier))
            .with(log_book.clone()),
    );
    let sink = Arc::new(TerminalSink::default());
    let parts = PipelineParts {
        backend: Arc::new(NokhwaBackend),
        client: Arc::new(HttpAnalysisClient::new(config.http_client_config())?),
        sink: sink.clone(),
        notifier,
    };

    let pipeline = Pipeline::start(parts, config.pipeline_config(), runtime.handle().clone())?;
    let orchestrator = pipeline.orchestrator().clone();

    if let Some(text) = interval {
        let applied = orchestrator.set_auto_capture_text(config.capture.auto_capture, &text);
        config.capture.interval_secs = applied.secs();
    }

    println!("Camera running. Commands: c = capture, a = toggle auto, i <secs> = interval, s = stats, q = quit");

    let (tx, rx) = mpsc::channel::<String>();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send("q".to_string());
    })?;
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        let _ = tx.send("q".to_string());
    });

    for line in rx {
        let mut words = line.split_whitespace();
        match words.next().unwrap_or("") {
            "c" | "capture" => match orchestrator.capture_now() {
                Ok(CaptureOutcome::Submitted { report, .. }) => println!(
                    "Submitted (sharpness {:.1}, brightness {:.1})",
                    report.sharpness, report.brightness
                ),
                Ok(CaptureOutcome::Rejected(report)) => println!(
                    "Rejected (sharpness {:.1}, brightness {:.1})",
                    report.sharpness, report.brightness
                ),
                Ok(CaptureOutcome::NoFrame) => println!("No frame available yet"),
                Ok(CaptureOutcome::Failed(e)) => println!("Failed: {}", e),
                Err(e) => println!("Invalid frame: {}", e),
            },
            "a" | "auto" => {
                let enabled = !orchestrator.auto_capture_enabled();
                orchestrator.set_auto_capture(enabled, orchestrator.auto_interval());
                config.capture.auto_capture = enabled;
            }
            "i" | "interval" => {
                let text = words.next().unwrap_or("");
                let applied = orchestrator
                    .set_auto_capture_text(orchestrator.auto_capture_enabled(), text);
                config.capture.interval_secs = applied.secs();
                println!("Interval {}", applied);
            }
            "s" | "stats" => {
                println!("{}", serde_json::to_string_pretty(&orchestrator.stats())?);
                println!(
                    "frames shown: {}, dropped: {}",
                    sink.frames(),
                    pipeline.mailbox().dropped()
                );
                if let Some(record) = orchestrator.latest() {
                    println!(
                        "latest #{}: {} - {}",
                        record.version,
                        record.outcome.material_type(),
                        record.outcome.summary()
                    );
                }
            }
            "l" | "log" => {
                for line in log_book.lines() {
                    println!("{}", line);
                }
            }
            "q" | "quit" => break,
            "" => {}
            other => println!("Unknown command: {}", other),
        }
    }

    pipeline.stop();
    if save {
        config.save_to_file(&path)?;
    }
    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    Ok(())
}

fn value_at<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn load_config(path: Option<PathBuf>) -> Result<StudyCamConfig> {
    let path = path.unwrap_or_else(StudyCamConfig::default_path);
    Ok(StudyCamConfig::load_from_file(path)?)
}

/// Counts preview frames and prints camera status changes
#[derive(Default)]
struct TerminalSink {
    frames: AtomicU64,
}

impl TerminalSink {
    fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl PreviewSink for TerminalSink {
    fn show_frame(&self, _frame: &Frame) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn camera_status(&self, connected: bool) {
        if connected {
            println!("[camera connected]");
        } else {
            println!("[camera not connected]");
        }
    }
}
