//! Rows command implementation.

use crate::cli::RowsArgs;
use crate::error::Result;
use crate::input::load_records;
use crate::output::Formatter;

/// Execute the rows command.
pub fn execute_rows(args: RowsArgs, formatter: &Formatter) -> Result<()> {
    let records = load_records(&args.input.csv, args.input.delimiter)?;
    println!("{}", formatter.format_records(&records)?);
    eprintln!("{}", formatter.info(&format!("{} record(s)", records.len())));
    Ok(())
}
