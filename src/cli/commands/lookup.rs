//! `calrisk lookup` - instrument range and tolerance covering a value

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::analysis::{
    find_instrument_tolerance, find_matching_tolerances, recalculate_tolerance, tolerance_summary, RangeMatch,
};
use crate::cli::helpers::{fmt_opt, print_structured, Session};
use crate::cli::table::Rows;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::units::UnitSystem;
use crate::entities::{Instrument, ToleranceSpec};
use crate::yaml::load_instruments;

#[derive(clap::Args, Debug)]
pub struct LookupArgs {
    /// Instrument file (YAML or JSON): one instrument or a list
    pub file: PathBuf,

    /// Value to look up
    #[arg(long, allow_negative_numbers = true)]
    pub value: f64,

    /// Unit of the value
    #[arg(long)]
    pub unit: String,

    /// Only instruments whose name contains this text
    #[arg(long, short = 'i')]
    pub instrument: Option<String>,

    /// List every matching range instead of the tightest
    #[arg(long)]
    pub all: bool,

    /// Print the normalized tolerance of the chosen range
    #[arg(long)]
    pub resolve: bool,
}

#[derive(Serialize)]
struct InstrumentLookup {
    instrument: String,
    matches: Vec<RangeMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ToleranceSpec>,
}

fn lookup(instrument: &Instrument, args: &LookupArgs) -> InstrumentLookup {
    let matches = if args.all {
        find_matching_tolerances(instrument, args.value, &args.unit)
    } else {
        find_instrument_tolerance(instrument, args.value, &args.unit)
            .into_iter()
            .collect()
    };
    let resolved = if args.resolve {
        recalculate_tolerance(instrument, args.value, &args.unit, None)
    } else {
        None
    };
    InstrumentLookup {
        instrument: instrument.display_name(),
        matches,
        resolved,
    }
}

pub fn run(args: LookupArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);

    if UnitSystem::lookup(&args.unit).is_none() {
        return Err(miette::miette!(
            code = "calrisk::units::unknown",
            help = "Run `calrisk units` to list supported units",
            "Unknown unit '{}'",
            args.unit
        ));
    }

    let instruments = load_instruments(&args.file)?;
    let filter = args.instrument.as_deref().map(str::to_lowercase);
    let results: Vec<InstrumentLookup> = instruments
        .iter()
        .filter(|i| {
            filter
                .as_deref()
                .map_or(true, |f| i.display_name().to_lowercase().contains(f))
        })
        .map(|i| lookup(i, &args))
        .collect();

    if results.is_empty() {
        return Err(miette::miette!(
            code = "calrisk::lookup::no_instrument",
            "No instrument in {} matches '{}'",
            args.file.display(),
            args.instrument.unwrap_or_default()
        ));
    }

    if print_structured(&results, session.format)? {
        return Ok(());
    }

    let mut rows = Rows::new(["Instrument", "Function", "Range", "Resolution", "Tolerance"]);
    for r in &results {
        for m in &r.matches {
            rows.push([
                r.instrument.clone(),
                m.function.clone(),
                m.range_info.clone(),
                fmt_opt(m.resolution),
                tolerance_summary(&m.tolerance),
            ]);
        }
    }

    if session.format == OutputFormat::Csv {
        print!("{}", rows.to_csv()?);
        return Ok(());
    }

    if rows.is_empty() {
        session.warn(format!("No range covers {} {}", args.value, args.unit));
    } else {
        println!("{}", rows.render());
    }

    for r in &results {
        if let Some(spec) = &r.resolved {
            println!();
            println!("{} {}", style("✓").green(), style(&r.instrument).bold());
            print!("{}", serde_yml::to_string(spec).into_diagnostic()?);
        }
    }
    Ok(())
}
