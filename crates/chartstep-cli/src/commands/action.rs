//! Verb commands - install, upgrade, uninstall and invoke
//!
//! The payload is read from stdin, checked against the step schema, then
//! handed to the dispatcher.

use chartstep_core::{PayloadValidator, Verb};
use chartstep_kube::{Mixin, Settings};
use console::style;

use crate::error::Result;
use crate::util;

/// Run a verb against the step read from stdin
pub async fn run(verb: Verb, settings: Settings) -> Result<()> {
    let payload = util::read_payload()?;
    PayloadValidator::new()?.validate(&payload)?;

    let mut mixin = Mixin::new(settings);
    mixin.run(verb, &payload).await?;

    println!("{} {} complete", style("✓").green().bold(), style(verb).cyan());
    Ok(())
}
