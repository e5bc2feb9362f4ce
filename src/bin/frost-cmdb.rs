//! CMDB configuration item operations over the ServiceNow Table API.
//!
//! Reads a JSON action object from stdin and writes the result to stdout.

use frost::{cli, domains};

#[tokio::main]
async fn main() {
    cli::init_tracing();
    let code = cli::run(domains::cmdb::VALID_ACTIONS, |client, params| {
        domains::cmdb::dispatch_action(client, params)
    })
    .await;
    std::process::exit(code);
}
