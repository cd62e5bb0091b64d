use super::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "freshcart", about = "Authenticated client for the FreshCart API")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a request through the authenticated pipeline and print the body.
    Fetch {
        /// Path relative to `api.base_url`, or an absolute URL.
        target: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Send without a credential.
        #[arg(long)]
        public: bool,
        /// Log in first with these credentials.
        #[arg(long, requires = "password")]
        email: Option<String>,
        #[arg(long, requires = "email")]
        password: Option<String>,
    },
    /// Ask the server whether an email address is registered.
    EmailExists { email: String },
}
