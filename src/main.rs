use colored::Colorize;
use std::time::{Duration, Instant};
use wk_animated::diagnostics;
use wk_animated::{
    AnimResult, AnimatedImage, Animation, AnimationFrame, CacheConfig, LogConfig, LogLevel,
};

fn main() -> AnimResult<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    if let Some(level) = std::env::var("WKANIM_LOG").ok().and_then(|v| parse_level(&v)) {
        diagnostics::init(LogConfig::new(level).with_sink(|message, level| {
            eprintln!("{} {}", format!("[{}]", level.label()).dimmed(), message);
        }))?;
    }

    let command = &args[1];
    let input = &args[2];

    match command.as_str() {
        "info" => {
            show_info(input)?;
        }
        "play" => {
            let ticks = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
            play(input, ticks)?;
        }
        "export" => {
            if args.len() < 5 {
                eprintln!("{} Frame index and output file required", "Error:".red().bold());
                std::process::exit(1);
            }
            let Ok(index) = args[3].parse::<usize>() else {
                eprintln!("{} Invalid frame index: {}", "Error:".red().bold(), args[3]);
                std::process::exit(1);
            };
            export_frame(input, index, &args[4])?;
        }
        "pack" => {
            if args.len() < 5 {
                eprintln!("{} Frame delay and input frames required", "Error:".red().bold());
                std::process::exit(1);
            }
            let Ok(delay_ms) = args[3].parse::<u32>() else {
                eprintln!("{} Invalid delay: {}", "Error:".red().bold(), args[3]);
                std::process::exit(1);
            };
            pack(input, delay_ms, &args[4..])?;
        }
        _ => {
            eprintln!("{} Unknown command: {}", "Error:".red().bold(), command);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_level(value: &str) -> Option<LogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Some(LogLevel::None),
        "error" => Some(LogLevel::Error),
        "warn" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "verbose" => Some(LogLevel::Verbose),
        _ => None,
    }
}

fn open(input: &str) -> AnimResult<AnimatedImage> {
    let data = std::fs::read(input)?;
    AnimatedImage::from_data_with_config(&data, &CacheConfig::default())
}

fn show_info(input: &str) -> AnimResult<()> {
    let image = open(input)?;
    let (width, height) = image.size();

    println!();
    println!("{}", "═══ Animated Image ═══".cyan().bold());
    println!(
        "{} {}x{}",
        "Dimensions:".dimmed(),
        width.to_string().white(),
        height.to_string().white()
    );
    println!(
        "{} {}",
        "Frames:".dimmed(),
        image.frame_count().to_string().yellow()
    );
    println!(
        "{} {}",
        "Loops:".dimmed(),
        if image.loop_count() == 0 {
            "forever".green()
        } else {
            image.loop_count().to_string().white()
        }
    );
    println!(
        "{} {}ms",
        "Duration:".dimmed(),
        image.total_duration().as_millis().to_string().magenta()
    );
    println!(
        "{} {} (max {})",
        "Cache window:".dimmed(),
        image.frame_cache_size_optimal().to_string().cyan(),
        match image.frame_cache_size_max() {
            0 => "none".to_string(),
            max => max.to_string(),
        }
    );
    if let Some(data) = image.data() {
        println!(
            "{} {} bytes",
            "Encoded:".dimmed(),
            data.len().to_string().white()
        );
    }

    println!();
    println!("{}", "═══ Frame Delays ═══".cyan().bold());
    for (index, delay) in image.delay_times_for_indexes().iter().enumerate() {
        println!("  {:>4} {}ms", index.to_string().dimmed(), delay.as_millis());
    }
    println!();

    Ok(())
}

/// Drives the image like a display link: one lookup per tick, holding the last frame on a miss.
fn play(input: &str, ticks: usize) -> AnimResult<()> {
    let image = open(input)?;
    let handle = image.handle();
    let frame_count = image.frame_count();

    println!(
        "{} {} ({} frames, {} ticks)",
        "Playing".cyan().bold(),
        input.yellow(),
        frame_count,
        ticks
    );

    let start = Instant::now();
    let mut index = 0;
    let mut loops = 0;
    let mut shown = 0;
    let mut held = 0;
    let mut skipped = 0;

    for _ in 0..ticks {
        if handle.is_failed(index) == Some(true) {
            skipped += 1;
            index = (index + 1) % frame_count;
            continue;
        }

        match handle.lookup(index) {
            Some(_) => {
                shown += 1;
                let delay = handle.delay_time(index).unwrap_or_default();
                std::thread::sleep(delay);
                index += 1;
                if index == frame_count {
                    index = 0;
                    loops += 1;
                    if handle.loop_count().is_some_and(|n| n != 0 && loops >= n) {
                        break;
                    }
                }
            }
            None => {
                held += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    let stats = image.cache_stats();
    println!("{}", "✓ Playback finished".green().bold());
    println!("  {} {}", "Shown:  ".dimmed(), shown.to_string().white());
    println!("  {} {}", "Held:   ".dimmed(), held.to_string().yellow());
    println!("  {} {}", "Skipped:".dimmed(), skipped.to_string().red());
    println!("  {} {}", "Loops:  ".dimmed(), loops.to_string().white());
    println!(
        "  {} {}%",
        "Hit rate:".dimmed(),
        format!("{:.1}", stats.hit_rate() * 100.0).cyan()
    );
    println!(
        "  {} {}",
        "Evicted:".dimmed(),
        stats.evictions.to_string().white()
    );
    println!(
        "  {} {:.2}s",
        "Elapsed:".dimmed(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn export_frame(input: &str, index: usize, output: &str) -> AnimResult<()> {
    println!(
        "{} frame {} of {} → {}",
        "Exporting".cyan().bold(),
        index.to_string().magenta(),
        input.yellow(),
        output.green()
    );

    let data = std::fs::read(input)?;
    let config = CacheConfig::default().with_predrawing(false);
    let image = AnimatedImage::from_data_with_config(&data, &config)?;
    let frame = image.image_at_index(index)?;
    frame.save(output)?;

    println!("{}", "✓ Exported successfully!".green().bold());
    Ok(())
}

fn pack(output: &str, delay_ms: u32, inputs: &[String]) -> AnimResult<()> {
    println!(
        "{} {} frames → {}",
        "Packing".cyan().bold(),
        inputs.len().to_string().magenta(),
        output.green()
    );

    let first = image::open(&inputs[0])?;
    let mut animation = Animation::new(first.width(), first.height()).infinite_loop();
    animation.add_frame(AnimationFrame::from_image(&first).with_delay(delay_ms))?;
    for input in &inputs[1..] {
        let img = image::open(input)?;
        animation.add_frame(AnimationFrame::from_image(&img).with_delay(delay_ms))?;
    }

    let bytes = animation.encode()?;
    std::fs::write(output, &bytes)?;

    println!("{}", "✓ Packed successfully!".green().bold());
    println!(
        "  {} {}ms",
        "Duration:".dimmed(),
        animation.total_duration_ms().to_string().white()
    );
    println!(
        "  {} {} bytes",
        "Output:  ".dimmed(),
        bytes.len().to_string().white()
    );

    Ok(())
}

fn print_usage() {
    println!();
    println!("{} {}", "WK Animated Image Tool".cyan().bold(), "v3.2".green());
    println!();
    println!("{}", "USAGE:".yellow().bold());
    println!("  {} {} <input>", "wkanim".white(), "info".green());
    println!("  {} {} <input> [ticks]", "wkanim".white(), "play".green());
    println!(
        "  {} {} <input> <index> <output.png>",
        "wkanim".white(),
        "export".green()
    );
    println!(
        "  {} {} <output.wka> <delay_ms> <frame>...",
        "wkanim".white(),
        "pack".green()
    );
    println!();
    println!("{}", "ENVIRONMENT:".yellow().bold());
    println!(
        "  {}  none | error | warn | info | debug | verbose",
        "WKANIM_LOG".white()
    );
    println!();
}
