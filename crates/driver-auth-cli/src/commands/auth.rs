//! Sign-in commands.

use super::CommandContext;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use driver_auth::{parse_magic_link_token, AuthError, Identity};
use serde_json::json;
use std::io::{self, Write};
use tracing::debug;

/// Wrong codes tolerated before giving up in interactive mode.
const MAX_CODE_PROMPTS: usize = 3;

/// Sign in with an SMS code.
///
/// Without `code`, the code is read from stdin and may be re-entered if the
/// backend rejects it.
pub async fn login_sms(
    ctx: &CommandContext,
    phone: &str,
    code: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let manager = ctx.session_manager()?;
    let device = ctx.config.device.clone();
    let locale = ctx.config.locale.clone();

    manager
        .start_sms_sign_in(device.clone(), locale.clone(), phone)
        .await?;

    let interactive = code.is_none();
    let mut next_code = code;
    for attempt in 1..=MAX_CODE_PROMPTS {
        let sms_code = match next_code.take() {
            Some(code) => code,
            None => prompt("SMS code: ")?,
        };

        match manager
            .confirm_sms_sign_in(device.clone(), locale.clone(), &sms_code)
            .await
        {
            Ok(identity) => {
                print_signed_in(&identity, format);
                return Ok(());
            }
            Err(AuthError::InvalidSmsCode { .. }) if interactive && attempt < MAX_CODE_PROMPTS => {
                debug!(attempt, "SMS code rejected");
                output::print_error("Invalid or expired SMS code, try again", format);
            }
            Err(e) => return Err(e.into()),
        }
    }

    anyhow::bail!("Too many invalid SMS codes")
}

/// Ask the backend to email a sign-in link.
pub async fn login_magic(ctx: &CommandContext, email: &str, format: &OutputFormat) -> Result<()> {
    let manager = ctx.session_manager()?;
    manager.request_magic_link(email).await?;

    output::print_success(
        &format!(
            "Sign-in link sent to {}. Run 'driver-auth magic-link --url <link>' once it arrives.",
            email
        ),
        format,
    );
    Ok(())
}

/// Complete sign-in with a magic-link URL.
pub async fn magic_link(ctx: &CommandContext, url: &str, format: &OutputFormat) -> Result<()> {
    let token = parse_magic_link_token(url)?;
    let manager = ctx.session_manager()?;

    let identity = manager
        .complete_magic_link_sign_in(&token, ctx.config.device.clone(), None)
        .await?;
    print_signed_in(&identity, format);
    Ok(())
}

fn print_signed_in(identity: &Identity, format: &OutputFormat) {
    let value = json!({
        "status": "success",
        "session_id": identity.session_id,
        "driver_id": identity.driver_id,
        "degraded": identity.degraded,
    });
    output::print_value(&value, format, || {
        println!("Signed in as driver {}", identity.driver_id);
        if identity.degraded {
            println!("Driver details could not be read from the token; ids are placeholders.");
        }
    });
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    if input.is_empty() {
        anyhow::bail!("No input given");
    }
    Ok(input)
}
