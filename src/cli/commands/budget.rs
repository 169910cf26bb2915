//! `calrisk budget` - GUM uncertainty budget of each test point

use console::style;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::analysis::{analyze, UncertaintyResult};
use crate::cli::helpers::{fmt_num, fmt_opt, print_structured, truncate_str, Session};
use crate::cli::table::Rows;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::expression::{CentralDifference, Differentiation, Symbolic};
use crate::entities::TestPoint;
use crate::yaml::load_test_points;

#[derive(clap::Args, Debug)]
pub struct BudgetArgs {
    /// Test-point file (YAML or JSON)
    pub file: PathBuf,

    /// Only the test point with this name (or 1-based index)
    #[arg(long, short = 'p')]
    pub point: Option<String>,

    /// Numeric sensitivity coefficients for derived measurements
    #[arg(long)]
    pub numeric: bool,
}

#[derive(Serialize)]
pub(crate) struct PointBudget {
    pub name: String,
    pub budget: Option<UncertaintyResult>,
}

/// Points of a file, optionally narrowed to one by name or index
pub(crate) fn select_points(points: Vec<TestPoint>, selector: Option<&str>) -> Result<Vec<TestPoint>> {
    let Some(selector) = selector else {
        return Ok(points);
    };
    if let Ok(index) = selector.parse::<usize>() {
        if let Some(point) = index.checked_sub(1).and_then(|i| points.get(i)) {
            return Ok(vec![point.clone()]);
        }
    }
    let selected: Vec<TestPoint> = points.into_iter().filter(|p| p.title() == selector).collect();
    if selected.is_empty() {
        return Err(miette::miette!(
            code = "calrisk::cli::no_point",
            "No test point named '{}'",
            selector
        ));
    }
    Ok(selected)
}

pub(crate) fn strategy(numeric: bool) -> Box<dyn Differentiation> {
    if numeric {
        Box::new(CentralDifference::default())
    } else {
        Box::new(Symbolic)
    }
}

fn component_rows(budget: &UncertaintyResult, point: Option<&str>, rows: &mut Rows) {
    let total = budget.combined_native * budget.combined_native;
    for c in &budget.components {
        let share = c
            .contribution
            .filter(|_| total > 0.0)
            .map(|u| u * u / total);
        let cells = [
            truncate_str(&c.name, 40),
            c.kind.to_string(),
            fmt_num(c.value),
            match (c.value_native, &c.unit_native) {
                (Some(v), Some(unit)) => format!("{} {}", fmt_num(v), unit),
                _ => "-".to_string(),
            },
            c.distribution.clone(),
            c.dof.to_string(),
            fmt_opt(c.sensitivity_coefficient),
            share.map_or_else(|| "-".to_string(), |s| format!("{:.1} %", s * 100.0)),
        ];
        rows.push(point.map(str::to_string).into_iter().chain(cells));
    }
}

fn print_summary(budget: &UncertaintyResult) {
    println!(
        "   Combined: {} {}{}",
        style(fmt_num(budget.combined_native)).cyan(),
        budget.unit,
        budget
            .combined_ppm
            .map(|ppm| format!(" ({} ppm)", fmt_num(ppm)))
            .unwrap_or_default()
    );
    println!(
        "   Effective DOF: {}   k = {:.3} at {:.2} %",
        budget.effective_dof,
        budget.k,
        budget.confidence * 100.0
    );
    println!(
        "   Expanded: {} {}",
        style(fmt_num(budget.expanded_native)).green().bold(),
        budget.unit
    );
    if let Some(result) = budget.nominal_result {
        println!("   Equation result: {} {}", fmt_num(result), budget.unit);
    }
}

pub fn run(args: BudgetArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let set = load_test_points(&args.file)?;
    let points = select_points(set.points.clone(), args.point.as_deref())?;
    let strategy = strategy(args.numeric);
    let base = session.config.requirements();

    session.info(format!(
        "Budgeting {} test point(s) from {}",
        points.len(),
        style(args.file.display()).cyan()
    ));

    let mut budgets = Vec::with_capacity(points.len());
    for point in &points {
        let requirements = set.requirements(point, base);
        let budget = analyze(point, requirements.confidence_fraction(), strategy.as_ref())?;
        match &budget {
            Some(b) => b.notes.iter().for_each(|n| session.detail(format!("{}: {}", point.title(), n))),
            None => session.warn(format!("{}: nothing to combine", point.title())),
        }
        budgets.push(PointBudget {
            name: point.title(),
            budget,
        });
    }

    if print_structured(&budgets, session.format)? {
        return Ok(());
    }

    let headers = ["Point", "Component", "Type", "u", "u (native)", "Distribution", "DOF", "ci", "Share"];
    if session.format == OutputFormat::Csv {
        let mut rows = Rows::new(headers);
        for b in &budgets {
            if let Some(budget) = &b.budget {
                component_rows(budget, Some(&b.name), &mut rows);
            }
        }
        print!("{}", rows.to_csv()?);
        return Ok(());
    }

    for b in &budgets {
        println!();
        println!("{}", style(&b.name).bold());
        let Some(budget) = &b.budget else {
            println!("   {}", style("No components").dim());
            continue;
        };
        let mut rows = Rows::new(headers.iter().skip(1).copied());
        component_rows(budget, None, &mut rows);
        println!("{}", rows.render());
        print_summary(budget);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MeasurementPoint;

    fn named(name: &str) -> TestPoint {
        TestPoint {
            name: Some(name.to_string()),
            uut_nominal: MeasurementPoint::new(1.0, "V"),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_points() {
        let points = vec![named("a"), named("b")];
        assert_eq!(select_points(points.clone(), None).unwrap().len(), 2);
        assert_eq!(select_points(points.clone(), Some("2")).unwrap()[0].title(), "b");
        assert_eq!(select_points(points.clone(), Some("a")).unwrap()[0].title(), "a");
        assert!(select_points(points, Some("c")).is_err());
    }
}
