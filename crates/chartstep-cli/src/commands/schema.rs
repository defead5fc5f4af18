//! Schema command - print the step payload schema

use chartstep_core::schema::schema;

use crate::error::Result;

pub fn run() -> Result<()> {
    println!("{}", schema());
    Ok(())
}
