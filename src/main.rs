mod args;

use std::time::Instant;

use clap::{CommandFactory, Parser};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::{parse_fd_stages, parse_pairing, parse_td_stages, parse_zero_padding, DynError};
use noise_xcorr::geo::{epoch_to_unix_seconds, Coordinates, DEFAULT_REFERENCE_EPOCH};
use noise_xcorr::xcf::peak_lag;
use noise_xcorr::{ChannelInfo, CorrelationSet, Engine, Subdivision, ThreadGroup, Trace, TraceOptions};

const NETWORK: &str = "XS";
const STATION_SPACING_DEG: f64 = 0.5;
const LOCAL_NOISE_STD: f64 = 0.3;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// One shared noise source seen by every station with a delay growing
/// linearly with the station index, plus independent local noise.
fn synthesize(args: &args::Args, start_time: f64) -> Result<Vec<Trace>, DynError> {
    let shift_per_station = (args.delay * args.sampling).round() as isize;
    let max_shift = shift_per_station.unsigned_abs() * args.stations.saturating_sub(1);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let normal = Normal::new(0.0, 1.0)?;
    let source: Vec<f64> = (0..args.samples + max_shift).map(|_| normal.sample(&mut rng)).collect();

    let components: &[(char, f64)] = if args.rotate {
        &[('E', 0.6), ('N', 0.8), ('Z', 1.0)]
    } else {
        &[('Z', 1.0)]
    };

    let mut traces = Vec::with_capacity(args.stations * components.len());
    for s in 0..args.stations {
        // Positive delays make later stations lag the first one.
        let lag = shift_per_station * s as isize;
        let offset = if shift_per_station >= 0 { max_shift as isize - lag } else { -lag };
        let offset = offset as usize;
        let coordinates = Coordinates::new(0.0, s as f64 * STATION_SPACING_DEG, 0.0);
        for &(component, gain) in components {
            let data = source[offset..offset + args.samples]
                .iter()
                .map(|v| gain * v + LOCAL_NOISE_STD * normal.sample(&mut rng))
                .collect();
            let info = ChannelInfo::new(NETWORK, &format!("S{s:02}"), "", &format!("HH{component}"))
                .with_coordinates(coordinates);
            traces.push(Trace::new(info, data, start_time, args.sampling));
        }
    }
    Ok(traces)
}

fn station_index(code: &str) -> Option<usize> {
    code.trim_start_matches('S').parse().ok()
}

fn report(set: &CorrelationSet, args: &args::Args) {
    println!("{:<24} {:>10} {:>10} {:>10} {:>9}", "pair", "peak[s]", "expect[s]", "dist[km]", "az[deg]");
    let step = (args.delay * args.sampling).round() / args.sampling;
    for trace in set.iter() {
        let stats = &trace.stats;
        let expected = stats
            .station
            .split_once('-')
            .and_then(|(a, b)| Some((station_index(a)?, station_index(b)?)))
            .map(|(a, b)| (b as f64 - a as f64) * step);
        let fmt_opt = |v: Option<f64>, prec: usize| v.map_or_else(|| "-".to_string(), |v| format!("{v:.prec$}"));
        println!(
            "{:<24} {:>10} {:>10} {:>10} {:>9}",
            format!("{}.{}", stats.station, stats.channel),
            fmt_opt(peak_lag(&trace.data, stats.sampling_rate), 3),
            fmt_opt(expected, 3),
            fmt_opt(stats.dist_km, 1),
            fmt_opt(stats.az, 1),
        );
    }
}

fn main() -> Result<(), DynError> {
    if std::env::args_os().len() == 1 {
        args::Args::command().print_help()?;
        println!();
        return Ok(());
    }

    let args = args::Args::parse();
    init_logging(args.debug);

    let available_cores = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) } as usize;
    if args.workers == 0 {
        return Err("--workers must be at least 1".into());
    }
    if args.workers > available_cores {
        return Err(format!(
            "--workers value ({}) exceeds the number of available cores ({})",
            args.workers, available_cores
        )
        .into());
    }
    if args.stations < 2 {
        return Err("--stations must be at least 2".into());
    }
    if args.samples == 0 {
        return Err("--samples must be at least 1".into());
    }
    if !(args.sampling > 0.0) {
        return Err("--sampling must be positive".into());
    }

    // Column-level parallelism inside each worker shares the remaining cores.
    rayon::ThreadPoolBuilder::new()
        .num_threads((available_cores / args.workers).max(1))
        .build_global()
        .map_err(|_| "Failed to initialise rayon thread pool")?;

    let reference_epoch = match &args.epoch {
        Some(epoch) => epoch_to_unix_seconds(epoch)?,
        None => DEFAULT_REFERENCE_EPOCH,
    };
    let options = TraceOptions {
        length_to_save: args.length_to_save,
        pairing: parse_pairing(&args.pairing)?,
        self_pairs: args.self_pairs,
        td_stages: parse_td_stages(args.td.as_deref())?,
        fd_stages: parse_fd_stages(args.fd.as_deref())?,
        zero_padding: parse_zero_padding(&args.zero_padding)?,
        normalize_correlation: !args.no_normalize,
        center_correlation: args.center,
        reference_epoch,
        rotate: args.rotate,
    };
    let traces = synthesize(&args, reference_epoch)?;

    println!("Starting noise cross-correlation with the following arguments:");
    println!("--------------------------------------------------");
    println!("  stations:   {} ({} channels)", args.stations, traces.len());
    println!("  samples:    {} @ {} Hz ({:.1} s)", args.samples, args.sampling, args.samples as f64 / args.sampling);
    println!("  workers:    {}", args.workers);
    println!("  lag window: +/-{} s", args.length_to_save);
    println!("  pairing:    {}", options.pairing);
    println!("  td stages:  {:?}", options.td_stages.iter().map(|s| s.name()).collect::<Vec<_>>());
    println!("  fd stages:  {:?}", options.fd_stages.iter().map(|s| s.name()).collect::<Vec<_>>());
    println!("  padding:    {:?}", options.zero_padding);
    println!("--------------------------------------------------");

    let subdivision = match (args.corr_len, args.corr_inc) {
        (Some(len), Some(inc)) => Some(Subdivision::new(len, inc)?),
        _ => None,
    };

    let engine = Engine::new();
    let started = Instant::now();
    let results = ThreadGroup::run(args.workers, |group| match &subdivision {
        Some(sub) => engine.correlate_subdivided(group, &traces, &options, sub),
        None => engine.correlate_traces(group, &traces, &options).map(|set| vec![set]),
    });
    let elapsed = started.elapsed();

    let mut per_rank = Vec::with_capacity(results.len());
    for result in results {
        per_rank.push(result?);
    }
    let Some(windows) = per_rank.first() else {
        return Err("worker group returned no results".into());
    };
    if per_rank.iter().any(|other| other != windows) {
        warn!("workers disagree on the correlation result");
    }
    info!(
        workers = args.workers,
        windows = windows.len(),
        correlations = windows.iter().map(CorrelationSet::len).sum::<usize>(),
        elapsed_ms = elapsed.as_millis() as u64,
        "done"
    );
    for (k, set) in windows.iter().enumerate() {
        if windows.len() > 1 {
            println!("window {k}");
        }
        report(set, &args);
    }
    Ok(())
}
