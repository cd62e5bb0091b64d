use anyhow::anyhow;
use freshcart::application_port::*;
use freshcart::client::*;
use freshcart::domain_model::*;
use freshcart::logger::*;
use freshcart::settings::*;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    logger.reload_from_config(&LogConfig::from(&project_settings.log))?;

    let client = Client::try_new(&project_settings).await?;

    let outcome = run(&client, cli.command).await;

    let shutdown_timeout = std::time::Duration::from_secs(10);
    match tokio::time::timeout(shutdown_timeout, client.shutdown()).await {
        Ok(_) => info!("client shutdown successfully"),
        Err(_) => error!("client shutdown timed out"),
    }

    outcome
}

async fn run(client: &Client, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Fetch {
            target,
            method,
            body,
            public,
            email,
            password,
        } => {
            if let (Some(email), Some(password)) = (email, password) {
                let user = client.login(LoginInput { email, password }).await?;
                info!(email = %user.email, "logged in");
            }

            let method = method.parse::<HttpMethod>().map_err(|e| anyhow!(e))?;
            let mut request = OutboundRequest::new(method, target);
            if let Some(body) = body {
                request = request.with_body(serde_json::from_str(&body)?);
            }
            if public {
                request = request.public();
            }

            match client.send(request).await {
                Ok(response) => {
                    std::io::stdout().write_all(&response.body)?;
                    Ok(())
                }
                Err(e) if e.is_session_ended() => {
                    let events = client.session_events();
                    if let SessionEvent::Ended { login_path, .. } = &*events.borrow() {
                        warn!(%login_path, "log in again to continue");
                    }
                    Err(e.into())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::EmailExists { email } => {
            let exists = client.account_service.check_email_exists(&email).await?;
            println!("{}", exists);
            Ok(())
        }
    }
}
