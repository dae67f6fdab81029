use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, Command};
use log::LevelFilter;
use std::env;
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pbr::ProgressBar;
use tgs2webp::progress::{NoProgress, ProgressReporter, RenderedFrames};
use tgs2webp::source::AnimationSource;
use tgs2webp::{extract, output, Converter, FrameCap, Repeat, Settings};

pub type BinResult<T, E = Box<dyn std::error::Error + Send + Sync>> = Result<T, E>;

fn main() {
    if let Err(e) = bin_main() {
        eprintln!("error: {e}");
        if let Some(e) = e.source() {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

fn bin_main() -> BinResult<()> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about("Converts Telegram animated stickers (.tgs) to animated WebP")
        .arg_required_else_help(true)
        .allow_negative_numbers(true)
        .arg(Arg::new("input")
            .help("Sticker file (.tgs or plain Lottie .json)")
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("output")
            .help("Destination file to write to; \"-\" means stdout")
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("width")
            .long("width")
            .short('W')
            .value_name("px")
            .value_parser(value_parser!(u32).range(1..=i64::from(tgs2webp::MAX_DIMENSION)))
            .help("Output width. By default the sticker's own size is used"))
        .arg(Arg::new("height")
            .long("height")
            .short('H')
            .value_name("px")
            .value_parser(value_parser!(u32).range(1..=i64::from(tgs2webp::MAX_DIMENSION)))
            .help("Output height (stretches if the width is also set)"))
        .arg(Arg::new("quality")
            .long("quality")
            .short('Q')
            .value_name("0-100")
            .value_parser(value_parser!(u8).range(0..=100))
            .default_value("80")
            .help("Lower quality gives a smaller file"))
        .arg(Arg::new("fps")
            .long("fps")
            .short('r')
            .value_name("num")
            .value_parser(value_parser!(f32))
            .default_value("30")
            .help("Playback frame rate. Only used with --no-preserve-timing"))
        .arg(Arg::new("no-preserve-timing")
            .long("no-preserve-timing")
            .action(ArgAction::SetTrue)
            .help("Play at --fps instead of stretching the frame rate to the sticker's duration"))
        .arg(Arg::new("max-frames")
            .long("max-frames")
            .value_name("num")
            .value_parser(value_parser!(u32).range(1..))
            .default_value("60")
            .help("Render at most this many frames"))
        .arg(Arg::new("no-frame-limit")
            .long("no-frame-limit")
            .action(ArgAction::SetTrue)
            .conflicts_with("max-frames")
            .help("Render every frame of the sticker (slow and large for long animations)"))
        .arg(Arg::new("max-size")
            .long("max-size")
            .value_name("KiB")
            .value_parser(value_parser!(u64).range(1..))
            .help("Drop frames and lower quality until the file fits in this many KiB"))
        .arg(Arg::new("min-quality")
            .long("min-quality")
            .value_name("0-100")
            .value_parser(value_parser!(u8).range(0..=100))
            .default_value("1")
            .help("Lowest quality allowed by --max-size"))
        .arg(Arg::new("repeat")
            .long("repeat")
            .value_name("num")
            .value_parser(value_parser!(i16).range(-1..))
            .help("Number of times the animation is repeated (-1 none, 0 forever or <value> repetitions)"))
        .arg(Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(ArgAction::SetTrue)
            .help("Do not display anything on standard output/console"))
        .arg(Arg::new("verbose")
            .long("verbose")
            .short('v')
            .action(ArgAction::SetTrue)
            .conflicts_with("quiet")
            .help("Explain frame rate and size decisions"))
        .get_matches_from(wild::args_os());

    let level = if matches.get_flag("verbose") { LevelFilter::Info } else { LevelFilter::Warn };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let input = matches.get_one::<PathBuf>("input").ok_or("Missing input")?;
    let output_path = DestPath::new(matches.get_one::<PathBuf>("output").ok_or("Missing output")?.as_os_str());

    let repeat = match matches.get_one::<i16>("repeat").copied().unwrap_or(0) {
        -1 => Repeat::Finite(0),
        0 => Repeat::Infinite,
        n => Repeat::Finite(n.unsigned_abs()),
    };
    let frame_cap = if matches.get_flag("no-frame-limit") {
        FrameCap::Unlimited
    } else {
        FrameCap::Limited(matches.get_one::<u32>("max-frames").copied().ok_or("Missing frame limit")?)
    };
    let max_bytes = match matches.get_one::<u64>("max-size") {
        Some(&kib) => Some(kib.checked_mul(1024).ok_or("Size limit is too large")?),
        None => None,
    };

    let settings = Settings {
        width: matches.get_one::<u32>("width").copied(),
        height: matches.get_one::<u32>("height").copied(),
        quality: matches.get_one::<u8>("quality").copied().ok_or("Missing quality")?,
        fps: matches.get_one::<f32>("fps").copied().ok_or("Missing fps")?,
        preserve_timing: !matches.get_flag("no-preserve-timing"),
        frame_cap,
        max_bytes,
        min_quality: matches.get_one::<u8>("min-quality").copied().ok_or("Missing minimum quality")?,
        repeat,
    };
    let quiet = matches.get_flag("quiet") || output_path == DestPath::Stdout;

    if !quiet {
        if settings.quality < 20 {
            eprintln!("warning: quality {} will give really bad results", settings.quality);
        }
        if settings.preserve_timing && matches.value_source("fps") == Some(clap::parser::ValueSource::CommandLine) {
            eprintln!("warning: --fps has no effect unless --no-preserve-timing is used");
        } else if !settings.preserve_timing && settings.fps > 50. {
            eprintln!("warning: web browsers support max 50 fps");
        }
    }

    let converter = Converter::new(settings)?;
    check_if_path_exists(input)?;
    let source = AnimationSource::load(input)?;
    let plan = extract::plan(source.info(), converter.settings())?;

    let mut pb;
    let mut nopb = NoProgress {};
    let progress: &mut dyn ProgressReporter = if quiet {
        &mut nopb
    } else {
        pb = ProgressBar::on(io::stderr(), plan.frame_count() as u64);
        pb.show_speed = false;
        pb.show_percent = false;
        pb.format(" #_. ");
        pb.message("Frame ");
        pb.set_max_refresh_rate(Some(Duration::from_millis(250)));
        &mut pb
    };

    let mut progress = RenderedFrames::new(progress, plan.frame_count());
    let res = converter.convert_animation(&source, &mut progress)?;
    match output_path {
        DestPath::Path(p) => {
            output::write_atomically(p, &res.data)
                .map_err(|e| format!("Can't write to {}: {}", p.display(), e))?;
        },
        DestPath::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(&res.data)?;
            out.flush()?;
        },
    };
    progress.done(&format!("tgs2webp created {} ({} frames at {:.2} fps, quality {}, {} bytes)",
        output_path, res.frames, res.fps, res.quality, res.data.len()));

    Ok(())
}

fn check_if_path_exists(path: &Path) -> BinResult<()> {
    if !path.exists() {
        let mut msg = format!("Unable to find the input file: \"{}\"", path.display());
        if path.is_relative() {
            msg += &format!(" (searched in \"{}\")", env::current_dir()?.display());
        }
        return Err(msg.into());
    }
    Ok(())
}

#[derive(PartialEq)]
enum DestPath<'a> {
    Path(&'a Path),
    Stdout,
}

impl<'a> DestPath<'a> {
    pub fn new(path: &'a OsStr) -> Self {
        if path == "-" {
            Self::Stdout
        } else {
            Self::Path(Path::new(path))
        }
    }
}

impl fmt::Display for DestPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Path(orig_path) => {
                let abs_path = dunce::canonicalize(orig_path);
                abs_path.as_ref().map(|p| p.as_path()).unwrap_or(orig_path).display().fmt(f)
            },
            Self::Stdout => f.write_str("stdout"),
        }
    }
}
