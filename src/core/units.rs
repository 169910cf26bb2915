//! Unit registry - quantity classification and SI scaling
//!
//! Every unit belongs to exactly one [`Quantity`]. Conversions scale through
//! the SI base unit of that quantity. Ratio units (`%`, `ppm`, `ppb`, `dB`)
//! are dimensionless; callers resolve them with [`ratio_multiplier`] against
//! a reference value instead of `to_si`.

use serde::{Deserialize, Serialize};

/// Physical quantity category of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    Voltage,
    Current,
    Resistance,
    Capacitance,
    Inductance,
    Power,
    Frequency,
    Time,
    Temperature,
    Length,
    Mass,
    Angle,
    Volume,
    Velocity,
    Acceleration,
    Pressure,
    Force,
    Torque,
    Flow,
    Energy,
    Illuminance,
    #[serde(rename = "Magnetic Field")]
    MagneticField,
    Ratio,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Quantity::Voltage => "Voltage",
            Quantity::Current => "Current",
            Quantity::Resistance => "Resistance",
            Quantity::Capacitance => "Capacitance",
            Quantity::Inductance => "Inductance",
            Quantity::Power => "Power",
            Quantity::Frequency => "Frequency",
            Quantity::Time => "Time",
            Quantity::Temperature => "Temperature",
            Quantity::Length => "Length",
            Quantity::Mass => "Mass",
            Quantity::Angle => "Angle",
            Quantity::Volume => "Volume",
            Quantity::Velocity => "Velocity",
            Quantity::Acceleration => "Acceleration",
            Quantity::Pressure => "Pressure",
            Quantity::Force => "Force",
            Quantity::Torque => "Torque",
            Quantity::Flow => "Flow",
            Quantity::Energy => "Energy",
            Quantity::Illuminance => "Illuminance",
            Quantity::MagneticField => "Magnetic Field",
            Quantity::Ratio => "Ratio",
        };
        write!(f, "{}", name)
    }
}

/// A registered unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Unit {
    /// Symbol as written in tolerance records (e.g. "mV", "kOhm")
    pub symbol: &'static str,

    /// Quantity category
    pub quantity: Quantity,

    /// Scale factor to the SI base unit of the quantity
    pub to_si: f64,
}

const fn unit(symbol: &'static str, quantity: Quantity, to_si: f64) -> Unit {
    Unit {
        symbol,
        quantity,
        to_si,
    }
}

use Quantity::*;

/// The unit table, grouped by quantity
static UNITS: &[Unit] = &[
    unit("V", Voltage, 1.0),
    unit("mV", Voltage, 1e-3),
    unit("uV", Voltage, 1e-6),
    unit("kV", Voltage, 1e3),
    unit("nV", Voltage, 1e-9),
    unit("A", Current, 1.0),
    unit("mA", Current, 1e-3),
    unit("uA", Current, 1e-6),
    unit("nA", Current, 1e-9),
    unit("pA", Current, 1e-12),
    unit("Ohm", Resistance, 1.0),
    unit("kOhm", Resistance, 1e3),
    unit("MOhm", Resistance, 1e6),
    unit("GOhm", Resistance, 1e9),
    unit("mOhm", Resistance, 1e-3),
    unit("F", Capacitance, 1.0),
    unit("mF", Capacitance, 1e-3),
    unit("uF", Capacitance, 1e-6),
    unit("nF", Capacitance, 1e-9),
    unit("pF", Capacitance, 1e-12),
    unit("H", Inductance, 1.0),
    unit("mH", Inductance, 1e-3),
    unit("uH", Inductance, 1e-6),
    unit("W", Power, 1.0),
    unit("mW", Power, 1e-3),
    unit("kW", Power, 1e3),
    unit("dBm", Power, 1.0),
    unit("Hz", Frequency, 1.0),
    unit("kHz", Frequency, 1e3),
    unit("MHz", Frequency, 1e6),
    unit("GHz", Frequency, 1e9),
    unit("s", Time, 1.0),
    unit("ms", Time, 1e-3),
    unit("us", Time, 1e-6),
    unit("ns", Time, 1e-9),
    unit("min", Time, 60.0),
    unit("hr", Time, 3600.0),
    unit("degC", Temperature, 1.0),
    unit("degF", Temperature, 0.55555555),
    unit("K", Temperature, 1.0),
    unit("m", Length, 1.0),
    unit("cm", Length, 0.01),
    unit("mm", Length, 0.001),
    unit("um", Length, 1e-6),
    unit("nm", Length, 1e-9),
    unit("in", Length, 0.0254),
    unit("ft", Length, 0.3048),
    unit("yd", Length, 0.9144),
    unit("mi", Length, 1609.34),
    unit("kg", Mass, 1.0),
    unit("g", Mass, 1e-3),
    unit("mg", Mass, 1e-6),
    unit("lb", Mass, 0.453592),
    unit("oz", Mass, 0.0283495),
    unit("t", Mass, 1000.0),
    unit("rad", Angle, 1.0),
    unit("deg", Angle, 0.0174532925),
    unit("mrad", Angle, 0.001),
    unit("arcmin", Angle, 0.000290888),
    unit("arcsec", Angle, 4.84814e-6),
    unit("rev", Angle, 6.2831853),
    unit("m^3", Volume, 1.0),
    unit("L", Volume, 0.001),
    unit("mL", Volume, 1e-6),
    unit("gal", Volume, 0.00378541),
    unit("fl-oz", Volume, 2.95735e-5),
    unit("m/s", Velocity, 1.0),
    unit("km/h", Velocity, 0.277778),
    unit("mph", Velocity, 0.44704),
    unit("ft/s", Velocity, 0.3048),
    unit("kn", Velocity, 0.514444),
    unit("m/s^2", Acceleration, 1.0),
    // standard gravity; "g" is the gram
    unit("gn", Acceleration, 9.80665),
    unit("ft/s^2", Acceleration, 0.3048),
    unit("Pa", Pressure, 1.0),
    unit("kPa", Pressure, 1e3),
    unit("MPa", Pressure, 1e6),
    unit("hPa", Pressure, 100.0),
    unit("bar", Pressure, 1e5),
    unit("mbar", Pressure, 100.0),
    unit("psi", Pressure, 6894.76),
    unit("psig", Pressure, 6894.76),
    unit("psia", Pressure, 6894.76),
    unit("inHg", Pressure, 3386.39),
    unit("mmHg", Pressure, 133.322),
    unit("torr", Pressure, 133.322),
    unit("atm", Pressure, 101325.0),
    unit("inH2O", Pressure, 249.089),
    unit("N", Force, 1.0),
    unit("kN", Force, 1e3),
    unit("lbf", Force, 4.44822),
    unit("ozf", Force, 0.278014),
    unit("kgf", Force, 9.80665),
    unit("N-m", Torque, 1.0),
    unit("N-cm", Torque, 0.01),
    unit("in-lb", Torque, 0.112985),
    unit("ft-lb", Torque, 1.35582),
    unit("in-ozf", Torque, 0.00706155),
    unit("ozf-in", Torque, 0.00706155),
    unit("kgf-m", Torque, 9.80665),
    unit("kgf-cm", Torque, 0.0980665),
    unit("m^3/s", Flow, 1.0),
    unit("L/min", Flow, 1.66667e-5),
    unit("cfm", Flow, 0.000471947),
    unit("gpm", Flow, 6.30902e-5),
    unit("J", Energy, 1.0),
    unit("kJ", Energy, 1e3),
    unit("Wh", Energy, 3600.0),
    unit("kWh", Energy, 3.6e6),
    unit("BTU", Energy, 1055.06),
    unit("cal", Energy, 4.184),
    unit("lx", Illuminance, 1.0),
    unit("fc", Illuminance, 10.7639),
    unit("T", MagneticField, 1.0),
    unit("mT", MagneticField, 1e-3),
    unit("uT", MagneticField, 1e-6),
    unit("G", MagneticField, 1e-4),
    unit("%", Ratio, 0.01),
    unit("ppm", Ratio, 1e-6),
    unit("ppb", Ratio, 1e-9),
    unit("dB", Ratio, 1.0),
];

/// Multiplier of a relative tolerance unit, `None` for anything else
pub fn ratio_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "%" => Some(0.01),
        "ppm" => Some(1e-6),
        "ppb" => Some(1e-9),
        _ => None,
    }
}

/// Stateless view over the unit table
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitSystem;

impl UnitSystem {
    /// Look up a unit by symbol
    pub fn lookup(unit: &str) -> Option<&'static Unit> {
        UNITS.iter().find(|u| u.symbol == unit)
    }

    /// Quantity of a unit, `None` when the symbol is not registered
    pub fn quantity(unit: &str) -> Option<Quantity> {
        Self::lookup(unit).map(|u| u.quantity)
    }

    /// Scale a value to the SI base unit. Unknown units pass through unchanged.
    pub fn to_base_unit(value: f64, unit: &str) -> f64 {
        match Self::lookup(unit) {
            Some(u) => value * u.to_si,
            None => value,
        }
    }

    /// Scale a value from the SI base unit. Unknown units pass through unchanged.
    pub fn from_base_unit(value: f64, unit: &str) -> f64 {
        match Self::lookup(unit) {
            Some(u) => value / u.to_si,
            None => value,
        }
    }

    /// All unit symbols sharing the quantity of `unit`
    ///
    /// An unregistered unit yields the two relative units `ppm` and `%`.
    pub fn relevant_units(unit: &str) -> Vec<&'static str> {
        match Self::quantity(unit) {
            Some(q) => Self::units_of(q),
            None => vec!["ppm", "%"],
        }
    }

    /// Units offered for a tolerance entered against `reference_unit`
    pub fn tolerance_unit_options(reference_unit: &str) -> Vec<&'static str> {
        let mut options = vec!["%", "ppm"];
        if let Some(q) = Self::quantity(reference_unit) {
            options.extend(Self::units_of(q));
        }
        options
    }

    /// All unit symbols of a quantity, in table order
    pub fn units_of(quantity: Quantity) -> Vec<&'static str> {
        UNITS
            .iter()
            .filter(|u| u.quantity == quantity)
            .map(|u| u.symbol)
            .collect()
    }

    /// Every registered unit
    pub fn all() -> &'static [Unit] {
        UNITS
    }

    /// Distinct quantities in table order
    pub fn quantities() -> Vec<Quantity> {
        let mut seen = Vec::new();
        for u in UNITS {
            if !seen.contains(&u.quantity) {
                seen.push(u.quantity);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_lookup() {
        assert_eq!(UnitSystem::quantity("mV"), Some(Quantity::Voltage));
        assert_eq!(UnitSystem::quantity("kOhm"), Some(Quantity::Resistance));
        assert_eq!(UnitSystem::quantity("g"), Some(Quantity::Mass));
        assert_eq!(UnitSystem::quantity("gn"), Some(Quantity::Acceleration));
        assert_eq!(UnitSystem::quantity("furlong"), None);
    }

    #[test]
    fn test_base_unit_round_trip() {
        for q in UnitSystem::quantities() {
            for symbol in UnitSystem::units_of(q) {
                let x = 12.345;
                let back = UnitSystem::from_base_unit(UnitSystem::to_base_unit(x, symbol), symbol);
                assert!((back - x).abs() < 1e-9, "round trip failed for {}", symbol);
            }
        }
    }

    #[test]
    fn test_unknown_unit_passes_through() {
        assert_eq!(UnitSystem::to_base_unit(3.5, "widgets"), 3.5);
        assert_eq!(UnitSystem::from_base_unit(3.5, "widgets"), 3.5);
    }

    #[test]
    fn test_to_base_unit_scales() {
        assert!((UnitSystem::to_base_unit(5000.0, "mV") - 5.0).abs() < 1e-12);
        assert!((UnitSystem::to_base_unit(2.0, "kOhm") - 2000.0).abs() < 1e-9);
        assert!((UnitSystem::to_base_unit(1.0, "psi") - 6894.76).abs() < 1e-9);
    }

    #[test]
    fn test_relevant_units() {
        let volts = UnitSystem::relevant_units("V");
        assert_eq!(volts, vec!["V", "mV", "uV", "kV", "nV"]);

        let unknown = UnitSystem::relevant_units("bogus");
        assert_eq!(unknown, vec!["ppm", "%"]);
    }

    #[test]
    fn test_tolerance_unit_options() {
        let opts = UnitSystem::tolerance_unit_options("A");
        assert_eq!(&opts[..3], &["%", "ppm", "A"]);
        assert_eq!(UnitSystem::tolerance_unit_options("bogus"), vec!["%", "ppm"]);
    }

    #[test]
    fn test_ratio_multiplier() {
        assert_eq!(ratio_multiplier("%"), Some(0.01));
        assert_eq!(ratio_multiplier("ppm"), Some(1e-6));
        assert_eq!(ratio_multiplier("ppb"), Some(1e-9));
        assert_eq!(ratio_multiplier("dB"), None);
        assert_eq!(ratio_multiplier("V"), None);
    }

    #[test]
    fn test_quantity_display() {
        assert_eq!(format!("{}", Quantity::MagneticField), "Magnetic Field");
        assert_eq!(format!("{}", Quantity::Voltage), "Voltage");
    }
}
