//! Build command - Dockerfile lines for the invocation image

use chartstep_kube::{Mixin, Settings};

use crate::error::Result;
use crate::util;

pub fn run(settings: Settings) -> Result<()> {
    let payload = util::read_payload()?;
    Mixin::new(settings).build(&payload)?;
    Ok(())
}
