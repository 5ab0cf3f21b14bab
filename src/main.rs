use contact_detector::diagnostics::PerfRegistry;
use contact_detector::parser::load_heatmaps;
use contact_detector::render::render_frame;
use contact_detector::types::Contact;
use contact_detector::{DetectorOptions, TouchDetector};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

enum Mode {
    Plot { input: PathBuf, out_dir: PathBuf },
    Perf { input: PathBuf, json_out: Option<PathBuf> },
}

fn run() -> Result<(), String> {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "contact-detector".to_string());
    let mode = parse_args(&program)?;

    match mode {
        Mode::Plot { input, out_dir } => plot(&input, &out_dir),
        Mode::Perf { input, json_out } => perf(&input, json_out.as_deref()),
    }
}

fn parse_args(program: &str) -> Result<Mode, String> {
    let mut args = env::args().skip(1);

    let command = args.next().ok_or_else(|| usage(program))?;
    match command.as_str() {
        "plot" => {
            let input = args.next().ok_or_else(|| usage(program))?;
            let out_dir = args.next().ok_or_else(|| usage(program))?;
            if args.next().is_some() {
                return Err(usage(program));
            }
            Ok(Mode::Plot {
                input: PathBuf::from(input),
                out_dir: PathBuf::from(out_dir),
            })
        }
        "perf" => {
            let input = args.next().ok_or_else(|| usage(program))?;
            let mut json_out = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--json-out" => {
                        let value = args
                            .next()
                            .ok_or_else(|| format!("--json-out expects a path\n{}", usage(program)))?;
                        json_out = Some(PathBuf::from(value));
                    }
                    other => return Err(format!("Unknown option '{other}'\n{}", usage(program))),
                }
            }
            Ok(Mode::Perf {
                input: PathBuf::from(input),
                json_out,
            })
        }
        "--help" | "-h" => {
            println!("{}", usage(program));
            std::process::exit(0);
        }
        _ => Err(usage(program)),
    }
}

fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} plot <dump> <output-directory>\n  {program} perf <dump> [--json-out report.json]\n\n\
Analyses heatmap dumps and reports touch contacts as fitted 2-D Gaussians.\n"
    )
}

fn plot(input: &std::path::Path, out_dir: &std::path::Path) -> Result<(), String> {
    let heatmaps = load_heatmaps(input)?;
    if heatmaps.is_empty() {
        return Err(format!("no heatmaps found in {}", input.display()));
    }
    fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create {}: {e}", out_dir.display()))?;

    let (w, h) = heatmaps[0].shape();
    let mut detector = TouchDetector::new(w, h, DetectorOptions::default());

    println!("Processing {} frames...", heatmaps.len());
    for (i, hm) in heatmaps.iter().enumerate() {
        if hm.shape() != (w, h) {
            log::warn!(
                "frame {i} has shape {:?}, expected {:?}; skipping",
                hm.shape(),
                (w, h)
            );
            continue;
        }
        detector.process(hm);

        let contacts: Vec<Contact> = detector.contacts().collect();
        let path = out_dir.join(format!("out-{i:04}.png"));
        render_frame(detector.filtered(), &contacts, &path)?;
    }

    print_statistics(detector.perf());
    Ok(())
}

fn perf(input: &std::path::Path, json_out: Option<&std::path::Path>) -> Result<(), String> {
    let heatmaps = load_heatmaps(input)?;
    if heatmaps.is_empty() {
        return Err(format!("no heatmaps found in {}", input.display()));
    }

    let (w, h) = heatmaps[0].shape();
    let mut detector = TouchDetector::new(w, h, DetectorOptions::default());

    println!("Processing...");
    for _ in 0..50 {
        for hm in &heatmaps {
            if hm.shape() == (w, h) {
                detector.process(hm);
            }
        }
    }

    print_statistics(detector.perf());

    if let Some(path) = json_out {
        let json = serde_json::to_string_pretty(&detector.perf().report())
            .map_err(|e| format!("Failed to serialize perf report: {e}"))?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        println!("Perf report written to {}", path.display());
    }

    Ok(())
}

fn print_statistics(perf: &PerfRegistry) {
    println!("Performance Statistics:");
    for e in perf.entries() {
        println!("  {}", e.label());
        println!("    N:      {:8}", e.measurements());
        println!("    full:   {:8.0}", e.total_us());
        println!("    mean:   {:8.0}", e.mean_us());
        println!("    stddev: {:8.0}", e.stddev_us());
        println!("    min:    {:8.0}", e.min_us());
        println!("    max:    {:8.0}", e.max_us());
        println!();
    }
}
