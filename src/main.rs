use color_eyre::eyre::{WrapErr, eyre};
use smartid_client::{
    Error, SmartIdClient,
    config::Config,
    protocol::{EndResult, SessionOutcome},
    telemetry,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let mut args = std::env::args().skip(1);
    let (Some(country), Some(national_id)) = (args.next(), args.next()) else {
        return Err(eyre!("usage: smartid-client <COUNTRY> <NATIONAL_ID>"));
    };

    let config = Config::load().wrap_err("Failed to load configuration")?;
    tracing::info!("Using provider at {}", config.provider.host);
    let client = SmartIdClient::new(config)?;

    let session = client
        .authenticate(&country, &national_id, Some("Hello World"))
        .await?;
    println!("Verification code: {}", session.verification_code());

    match client.await_result(session, false).await {
        Ok(SessionOutcome::Verified(identity)) => {
            let subject = &identity.subject;
            println!(
                "Authenticated {} {} ({})",
                subject.given_name.as_deref().unwrap_or("-"),
                subject.surname.as_deref().unwrap_or("-"),
                subject.national_identifier().as_deref().unwrap_or("-"),
            );
        }
        Ok(SessionOutcome::Denied(denied)) => match denied.end_result {
            EndResult::UserRefused => println!("User refused the request"),
            EndResult::Timeout => println!("User did not respond in time"),
            EndResult::DocumentUnusable => println!("Smart-ID account cannot be used"),
            EndResult::WrongVc => println!("User picked the wrong verification code"),
            other => println!("Authentication ended with {other}"),
        },
        Err(Error::DeadlineExceeded) => println!("Gave up waiting for the user"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
