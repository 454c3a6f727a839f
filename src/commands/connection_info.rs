use std::io::Write;

use crate::cli::OutputFormat;
use crate::cloud::Namespace;
use crate::error::Result;
use crate::output;

pub fn execute<W: Write>(cloud: &Namespace, format: OutputFormat, out: &mut W) -> Result<()> {
    let info = cloud.connection_info()?;
    output::print_connection_info(out, &info, format)
}
