//! `calrisk risk` - conformance-risk report of each test point

use console::style;
use miette::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;

use super::budget::{select_points, strategy};
use crate::analysis::analyze;
use crate::cli::helpers::{fmt_num, fmt_opt, fmt_percent, print_structured, verdict, Session};
use crate::cli::table::Rows;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::risk::{simulate, MonteCarloResult, RiskInputs, RiskReport, TurCorrection};
use crate::yaml::load_test_points;

#[derive(clap::Args, Debug)]
pub struct RiskArgs {
    /// Test-point file (YAML or JSON)
    pub file: PathBuf,

    /// Only the test point with this name (or 1-based index)
    #[arg(long, short = 'p')]
    pub point: Option<String>,

    /// Cross-check PFA/PFR with this many simulated calibrations
    #[arg(long, value_name = "N")]
    pub monte_carlo: Option<usize>,

    /// Seed for the Monte Carlo run
    #[arg(long, requires = "monte_carlo")]
    pub seed: Option<u64>,

    /// Numeric sensitivity coefficients for derived measurements
    #[arg(long)]
    pub numeric: bool,
}

#[derive(Serialize)]
struct PointRisk {
    name: String,
    report: RiskReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    monte_carlo: Option<MonteCarloResult>,
}

fn monte_carlo(report: &RiskReport, samples: usize, seed: Option<u64>) -> Option<MonteCarloResult> {
    let inputs = RiskInputs {
        nominal: Some(report.nominal),
        average: None,
        low: report.low,
        high: report.high,
        u_cal: report.u_cal,
    };
    let correction = report.tur.map(|tur| TurCorrection {
        tur,
        required: report.requirements.needed_tur,
    });
    let reliability = report.requirements.reliability / 100.0;
    match seed {
        Some(seed) => simulate(&inputs, reliability, correction, samples, &mut StdRng::seed_from_u64(seed)),
        None => simulate(&inputs, reliability, correction, samples, &mut rand::rng()),
    }
}

fn limits(report: &RiskReport) -> String {
    format!("{} .. {} {}", fmt_opt(report.low), fmt_opt(report.high), report.unit)
}

fn print_report(point: &PointRisk, verbose: bool) {
    let r = &point.report;
    let gb = &r.guard_band;

    println!();
    println!("{} ({})", style(&point.name).bold(), r.risk_type);
    println!("   Limits: {}", limits(r));
    println!("   u_cal: {} {}   U: {} {}", fmt_num(r.u_cal), r.unit, fmt_num(r.expanded), r.unit);
    println!(
        "   TUR: {} [{}]   TAR: {}",
        fmt_opt(r.tur),
        verdict(r.tur_adequate()),
        fmt_opt(r.tar)
    );
    println!(
        "   PFA: {} [{}]   PFR: {}",
        fmt_percent(r.pfa.map(|t| t.total)),
        verdict(r.pfa_adequate()),
        fmt_percent(r.pfr.map(|t| t.total))
    );

    if gb.low_limit.is_some() || gb.high_limit.is_some() {
        println!();
        println!("   {}:", style("Guard band").bold());
        println!(
            "     Acceptance: {} .. {} {}",
            fmt_opt(gb.low_limit),
            fmt_opt(gb.high_limit),
            r.unit
        );
        if let Some(ratio) = gb.ratio {
            println!("     Multiplier: {:.4}", ratio.reported);
        }
        println!(
            "     PFA: {}   PFR: {}",
            fmt_percent(gb.pfa.map(|t| t.total)),
            fmt_percent(gb.pfr.map(|t| t.total))
        );
        if let Some(f) = gb.interval {
            println!("     Interval: {}", fmt_num(f.primary));
        }
    }

    if let Some(f) = r.interval {
        println!();
        println!("   {}:", style("Interval").bold());
        println!(
            "     {} (observed reliability {}, predicted {})",
            style(fmt_num(f.primary)).cyan(),
            fmt_percent(Some(f.observed)),
            fmt_percent(Some(f.predicted))
        );
    }

    if verbose {
        let mut rows = Rows::new(["TAR term", "Span"]);
        for c in r.uut_breakdown.iter().chain(&r.tmde_breakdown) {
            rows.push([c.name.clone(), format!("{} {}", fmt_num(c.span), r.unit)]);
        }
        if !rows.is_empty() {
            println!("{}", rows.render());
        }
        if let Some(t) = r.pfa {
            println!(
                "   PFA terms: lower {} upper {} (u_uut {}, rho {:.4})",
                fmt_percent(Some(t.lower)),
                fmt_percent(Some(t.upper)),
                fmt_num(t.u_uut),
                t.correlation
            );
        }
    }

    if let Some(mc) = point.monte_carlo {
        println!();
        println!("   {} ({} samples):", style("Monte Carlo").bold(), mc.samples);
        println!(
            "     PFA: {} ± {}   PFR: {} ± {}",
            fmt_percent(Some(mc.pfa)),
            fmt_percent(Some(mc.pfa_std_error)),
            fmt_percent(Some(mc.pfr)),
            fmt_percent(Some(mc.pfr_std_error))
        );
    }
}

pub fn run(args: RiskArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let set = load_test_points(&args.file)?;
    let points = select_points(set.points.clone(), args.point.as_deref())?;
    let strategy = strategy(args.numeric);
    let solver = session.solver();
    let base = session.config.requirements();

    session.info(format!(
        "Evaluating risk for {} test point(s) from {}",
        points.len(),
        style(args.file.display()).cyan()
    ));

    let mut results = Vec::with_capacity(points.len());
    for point in &points {
        let requirements = set.requirements(point, base);
        let Some(budget) = analyze(point, requirements.confidence_fraction(), strategy.as_ref())? else {
            session.warn(format!("{}: no uncertainty budget, skipped", point.title()));
            continue;
        };
        let report = RiskReport::evaluate(point, &requirements, &budget, &solver)?;
        for note in budget.notes.iter().chain(&report.notes) {
            session.detail(format!("{}: {}", point.title(), note));
        }
        let mc = args.monte_carlo.and_then(|n| monte_carlo(&report, n, args.seed));
        if args.monte_carlo.is_some() && mc.is_none() {
            session.detail(format!("{}: Monte Carlo not applicable to these limits", point.title()));
        }
        results.push(PointRisk {
            name: point.title(),
            report,
            monte_carlo: mc,
        });
    }

    if print_structured(&results, session.format)? {
        return Ok(());
    }

    if session.format == OutputFormat::Csv {
        let mut rows = Rows::new([
            "point", "unit", "low", "high", "u_cal", "expanded", "tur", "tar", "pfa", "pfr", "gb_low", "gb_high",
            "gb_pfa", "interval",
        ]);
        let num = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        for p in &results {
            let r = &p.report;
            rows.push([
                p.name.clone(),
                r.unit.clone(),
                num(r.low),
                num(r.high),
                r.u_cal.to_string(),
                r.expanded.to_string(),
                num(r.tur),
                num(r.tar),
                num(r.pfa.map(|t| t.total)),
                num(r.pfr.map(|t| t.total)),
                num(r.guard_band.low_limit),
                num(r.guard_band.high_limit),
                num(r.guard_band.pfa.map(|t| t.total)),
                num(r.interval.map(|f| f.primary)),
            ]);
        }
        print!("{}", rows.to_csv()?);
        return Ok(());
    }

    for p in &results {
        print_report(p, session.verbose);
    }
    Ok(())
}
