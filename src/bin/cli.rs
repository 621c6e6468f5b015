use anyhow::{bail, Context, Result};
use crabrec::testing::{SyntheticBackend, SyntheticEncoderFactory};
use crabrec::{
    Artifact, CaptureBackend, DefaultEncoderFactory, EncoderFactory, NativeBackend, RecorderConfig,
    Selection, Sequencer,
};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: crabrec-cli <command> [args]

Commands:
  record [--camera] [--microphone] [--display-video] [--display-audio] [--mix]
         [--seconds N] [--config PATH] [--out DIR] [--synthetic] [--json]
  mime-types [--synthetic]
  default-config";

fn main() -> Result<()> {
    crabrec::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "record" => cmd_record(&args[2..]),
        "mime-types" => cmd_mime_types(&args[2..]),
        "default-config" => cmd_default_config(),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

struct RecordArgs {
    selection: Selection,
    seconds: Option<u64>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    synthetic: bool,
    json: bool,
}

fn parse_record_args(args: &[String]) -> Result<RecordArgs> {
    let mut parsed = RecordArgs {
        selection: Selection::default(),
        seconds: None,
        config: None,
        out: None,
        synthetic: false,
        json: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--camera" => parsed.selection.camera = true,
            "--microphone" => parsed.selection.microphone = true,
            "--display-video" => parsed.selection.display_video = true,
            "--display-audio" => parsed.selection.display_audio = true,
            "--mix" => parsed.selection.mix_microphone_and_display_audio = true,
            "--synthetic" => parsed.synthetic = true,
            "--json" => parsed.json = true,
            "--seconds" => {
                let value = args.get(i + 1).context("--seconds needs a value")?;
                parsed.seconds = Some(value.parse().context("--seconds must be a whole number")?);
                i += 1;
            }
            "--config" => {
                parsed.config = Some(PathBuf::from(args.get(i + 1).context("--config needs a path")?));
                i += 1;
            }
            "--out" => {
                parsed.out = Some(PathBuf::from(args.get(i + 1).context("--out needs a directory")?));
                i += 1;
            }
            other => bail!("Unknown option for record: {}", other),
        }
        i += 1;
    }

    if parsed.selection.is_empty() {
        bail!("record needs at least one of --camera, --microphone, --display-video, --display-audio");
    }
    Ok(parsed)
}

fn build_sequencer(config: RecorderConfig, synthetic: bool) -> Sequencer {
    let (backend, encoders): (Arc<dyn CaptureBackend>, Arc<dyn EncoderFactory>) = if synthetic {
        (
            Arc::new(SyntheticBackend::new()),
            Arc::new(SyntheticEncoderFactory::new(["video/webm;codecs=vp8"])),
        )
    } else {
        (Arc::new(NativeBackend::new()), Arc::new(DefaultEncoderFactory))
    };
    Sequencer::new(backend, encoders, config)
}

fn cmd_record(args: &[String]) -> Result<()> {
    let args = parse_record_args(args)?;

    let mut config = match &args.config {
        Some(path) => RecorderConfig::load_from_file(path)?,
        None => RecorderConfig::load_or_default(),
    };
    if let Some(out) = &args.out {
        config.storage.output_directory = out.to_string_lossy().into_owned();
    }
    let out_dir = PathBuf::from(&config.storage.output_directory);
    let prefix = config.storage.file_prefix.clone();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl-C handler")?;
    }

    let mut sequencer = build_sequencer(config, args.synthetic);
    let session_id = sequencer.start(&args.selection).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let mime_type = sequencer.session_stats()?.mime_type;
    if !args.json {
        match args.seconds {
            Some(n) => eprintln!("Recording session {} ({}) for {}s...", session_id, mime_type, n),
            None => eprintln!("Recording session {} ({}), press Ctrl-C to stop...", session_id, mime_type),
        }
    }

    let deadline = args.seconds.map(|n| Instant::now() + Duration::from_secs(n));
    while !interrupted.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        std::thread::sleep(Duration::from_millis(50));
    }

    let artifact = sequencer
        .stop()
        .map_err(|e| anyhow::anyhow!(e.user_message()))?
        .context("Recording stopped without a session")?;

    let path = match &artifact.saved_path {
        Some(path) => path.clone(),
        None => artifact.save_to(&out_dir, &prefix)?,
    };
    print_artifact(&artifact, &path, args.json)
}

fn print_artifact(artifact: &Artifact, path: &std::path::Path, json: bool) -> Result<()> {
    if json {
        let mut value = serde_json::to_value(artifact)?;
        value["path"] = serde_json::Value::String(path.to_string_lossy().into_owned());
        value["url"] = serde_json::Value::String(artifact.url());
        value["size"] = serde_json::Value::from(artifact.size());
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("Saved {} ({} bytes, {})", path.display(), artifact.size(), artifact.mime_type);
        println!(
            "  {} chunk(s), {} video / {} audio track(s), {:.1}s",
            artifact.chunk_count,
            artifact.video_track_count(),
            artifact.audio_track_count(),
            artifact.duration.as_secs_f64()
        );
    }
    Ok(())
}

fn cmd_mime_types(args: &[String]) -> Result<()> {
    let synthetic = args.iter().any(|a| a == "--synthetic");
    let sequencer = build_sequencer(RecorderConfig::load_or_default(), synthetic);
    let supported = sequencer.supported_mime_types();
    if supported.is_empty() {
        println!("No preferred type is supported; recordings use the default container");
    }
    for mime in supported {
        println!("{}", mime);
    }
    Ok(())
}

fn cmd_default_config() -> Result<()> {
    let toml = toml::to_string_pretty(&RecorderConfig::default())?;
    print!("{}", toml);
    Ok(())
}
