//! `calrisk units` - browse the unit registry

use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{print_structured, Session};
use crate::cli::table::Rows;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::units::{Unit, UnitSystem};

#[derive(clap::Args, Debug)]
pub struct UnitsArgs {
    /// Only list units of the same quantity as this one
    pub unit: Option<String>,
}

#[derive(Serialize)]
struct UnitRow {
    symbol: &'static str,
    quantity: String,
    to_si: f64,
}

impl From<&Unit> for UnitRow {
    fn from(u: &Unit) -> Self {
        Self {
            symbol: u.symbol,
            quantity: u.quantity.to_string(),
            to_si: u.to_si,
        }
    }
}

pub fn run(args: UnitsArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);

    let units: Vec<&Unit> = match &args.unit {
        Some(symbol) => {
            let quantity = UnitSystem::quantity(symbol).ok_or_else(|| {
                miette::miette!(
                    code = "calrisk::units::unknown",
                    help = "Run `calrisk units` to list supported units",
                    "Unknown unit '{}'",
                    symbol
                )
            })?;
            UnitSystem::all().iter().filter(|u| u.quantity == quantity).collect()
        }
        None => UnitSystem::all().iter().collect(),
    };
    let rows: Vec<UnitRow> = units.iter().map(|u| UnitRow::from(*u)).collect();

    if print_structured(&rows, session.format)? {
        return Ok(());
    }

    let mut table = Rows::new(["Unit", "Quantity", "To SI"]);
    for row in &rows {
        table.push([row.symbol.to_string(), row.quantity.clone(), format!("{:e}", row.to_si)]);
    }

    if session.format == OutputFormat::Csv {
        print!("{}", table.to_csv()?);
        return Ok(());
    }

    println!("{}", table.render());
    if !session.quiet {
        println!(
            "{} unit(s) in {} quantit{}",
            style(rows.len()).cyan(),
            style(UnitSystem::quantities().iter().filter(|q| units.iter().any(|u| u.quantity == **q)).count()).cyan(),
            if args.unit.is_some() { "y" } else { "ies" }
        );
    }
    Ok(())
}
