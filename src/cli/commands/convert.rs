//! `calrisk convert` - ppm conversions against a reference value

use clap::Subcommand;
use miette::Result;
use serde::Serialize;

use crate::analysis::{convert_ppm_to_unit, convert_to_ppm_explained};
use crate::cli::helpers::{fmt_num, print_structured, Session};
use crate::cli::table::Rows;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::MeasurementPoint;

#[derive(Subcommand, Debug)]
pub enum ConvertCommands {
    /// Express an absolute deviation in ppm of a nominal
    ToPpm(ToPpmArgs),

    /// Express a ppm value as an absolute deviation
    FromPpm(FromPpmArgs),
}

#[derive(clap::Args, Debug)]
pub struct Reference {
    /// Reference (nominal) value
    #[arg(long, allow_negative_numbers = true)]
    pub nominal: f64,

    /// Unit of the reference value
    #[arg(long)]
    pub nominal_unit: String,
}

#[derive(clap::Args, Debug)]
pub struct ToPpmArgs {
    /// Deviation to convert
    #[arg(allow_negative_numbers = true)]
    pub value: f64,

    /// Unit of the deviation (%, ppm, ppb, or a unit of the nominal's quantity)
    pub unit: String,

    #[command(flatten)]
    pub reference: Reference,

    /// Full-scale value used when the nominal is zero
    #[arg(long)]
    pub full_scale: Option<f64>,

    /// Show the arithmetic
    #[arg(long)]
    pub explain: bool,
}

#[derive(clap::Args, Debug)]
pub struct FromPpmArgs {
    /// ppm of the reference value
    #[arg(allow_negative_numbers = true)]
    pub ppm: f64,

    /// Target unit
    pub unit: String,

    #[command(flatten)]
    pub reference: Reference,
}

#[derive(Serialize)]
struct Converted {
    value: f64,
    unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

pub fn run(cmd: ConvertCommands, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);

    let converted = match cmd {
        ConvertCommands::ToPpm(args) => {
            let c = convert_to_ppm_explained(
                args.value,
                &args.unit,
                args.reference.nominal,
                &args.reference.nominal_unit,
                args.full_scale,
            )?;
            Converted {
                value: c.ppm,
                unit: "ppm".to_string(),
                explanation: args.explain.then_some(c.explanation),
            }
        }
        ConvertCommands::FromPpm(args) => {
            let reference = MeasurementPoint::new(args.reference.nominal, args.reference.nominal_unit);
            Converted {
                value: convert_ppm_to_unit(args.ppm, &args.unit, &reference)?,
                unit: args.unit,
                explanation: None,
            }
        }
    };

    if print_structured(&converted, session.format)? {
        return Ok(());
    }
    if session.format == OutputFormat::Csv {
        let mut rows = Rows::new(["value", "unit"]);
        rows.push([converted.value.to_string(), converted.unit]);
        print!("{}", rows.to_csv()?);
        return Ok(());
    }

    println!("{} {}", fmt_num(converted.value), converted.unit);
    if let Some(explanation) = converted.explanation {
        println!("   {}", explanation);
    }
    Ok(())
}
