use hyperkmc::geometry::Dimensions;
use hyperkmc::lattice::Proportions;
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::Table;

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}

/// Converts the three clap-validated `--dimensions` values.
pub fn dimensions_from(values: &[usize]) -> Dimensions {
    Dimensions::new(values[0], values[1], values[2])
}

/// Converts the three clap-validated `--proportions` values.
pub fn proportions_from(values: &[f64]) -> Proportions {
    Proportions::new(values[0], values[1], values[2])
}
