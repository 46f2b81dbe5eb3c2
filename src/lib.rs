use clap::ValueEnum;

pub mod catalog;
pub mod error;
pub mod harness;
pub mod host;
pub mod idle;
pub mod report;
pub mod resolver;
pub mod runner;
pub mod schema;
pub mod simctl;

#[cfg(test)]
mod testing;

/// Whether each repetition starts from an erased instance.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum BootMode {
    /// Erase the instance before every boot.
    #[default]
    Cold,
    /// Boot the instance as-is, keeping its previous state.
    Warm,
}

impl BootMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootMode::Cold => "cold",
            BootMode::Warm => "warm",
        }
    }
}

/// How the summary table groups results.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum GroupBy {
    /// By device when several devices were requested, otherwise by version.
    #[default]
    Auto,
    Device,
    Version,
}
