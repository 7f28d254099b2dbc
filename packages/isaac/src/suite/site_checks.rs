use crate::context::SuiteContext;
use crate::site::{check_hsts, fetch_hsts};
use anyhow::Result;
use tracing::{error, info};

/// Asks the site directly, outside the browser, for its HSTS policy.
pub fn hsts_header(ctx: &SuiteContext) -> Result<bool> {
    ctx.pause();
    let checked =
        fetch_hsts(&ctx.http, &ctx.settings.site_url).and_then(|header| check_hsts(&header));
    match checked {
        Ok(max_age) => {
            info!("HSTS header contains all required directives.");
            info!("HSTS header contains suitable max-age directive ({}s).", max_age);
            pass!("Valid and sensible HSTS header found.");
            Ok(true)
        }
        Err(e) => {
            error!("{}", e);
            Ok(false)
        }
    }
}
