mod args;
mod config;

use args::{Args, Command};
use clap::Parser;
use config::Config;
use directories::ProjectDirs;
use itertools::Itertools;
use jmapc::{
    jmap::{
        Comparator, Echo, Email, EmailAddress, EmailFilterCondition, EmailGet, EmailQuery, Filter,
        Get, Id, MethodCall, MethodResponse, Query,
    },
    reference::{ListOrRef, Ref, RefPath},
    Client, Invocation, Outcome,
};
use log::info;
use serde_json::{Map, Value};
use snafu::{prelude::*, Whatever};
use std::path::PathBuf;

const QUERY_ID: &str = "query";
const GET_ID: &str = "emails";

fn try_main() -> Result<(), Whatever> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let config_dir = match args.path {
        Some(path) => path,
        None => ProjectDirs::from("", "", "jmapc")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .whatever_context("Could not determine the config directory")?,
    };
    let config = load_config(config_dir)?;

    let password = config
        .password()
        .with_whatever_context(|source| format!("Could not get password: {}", source))?;
    let client = Client::open(
        &config.session_url,
        &config.username,
        &password,
        config.timeout,
    )
    .with_whatever_context(|source| format!("Could not open remote session: {}", source))?;
    info!("Using account {}", client.account_id());

    match args.command {
        Command::Mailboxes => mailboxes(&client),
        Command::Recent { mailbox, limit } => recent(&client, mailbox, limit),
        Command::Echo { json } => echo(&client, &json),
    }
}

fn load_config(dir: PathBuf) -> Result<Config, Whatever> {
    Config::from_file(dir.join("jmapc.toml"))
        .with_whatever_context(|source| format!("Could not load config: {}", source))
}

/// The call's own response, decoded.
fn primary(outcome: Outcome) -> Result<MethodResponse, Whatever> {
    outcome
        .into_results()
        .into_iter()
        .next()
        .whatever_context("Server sent no response")?
        .with_whatever_context(|source| format!("Could not decode response: {}", source))
}

fn mailboxes(client: &Client<jmapc::transport::HttpTransport>) -> Result<(), Whatever> {
    let get = Get {
        properties: Some(vec!["id".into(), "name".into(), "role".into()]),
        ..Default::default()
    };
    let outcome = client
        .method_call(MethodCall::MailboxGet(get))
        .with_whatever_context(|source| format!("Could not get mailboxes: {}", source))?;
    let response = primary(outcome)?
        .expect_mailbox_get()
        .with_whatever_context(|source| format!("Could not get mailboxes: {}", source))?;

    for mailbox in response
        .list
        .iter()
        .sorted_by(|a, b| a.name.cmp(&b.name))
    {
        println!(
            "{}\t{}\t{}",
            mailbox.id.as_ref().map(Id::to_string).unwrap_or_default(),
            mailbox.role.as_option().map_or("", |role| role.as_str()),
            mailbox.name.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

fn recent(
    client: &Client<jmapc::transport::HttpTransport>,
    mailbox: Option<String>,
    limit: u64,
) -> Result<(), Whatever> {
    let query = EmailQuery {
        query: Query {
            filter: mailbox.map(|mailbox| {
                Filter::Condition(EmailFilterCondition {
                    in_mailbox: Some(Id(mailbox)),
                    ..Default::default()
                })
            }),
            sort: Some(vec![Comparator {
                is_ascending: false,
                ..Comparator::new("receivedAt")
            }]),
            limit: Some(limit),
            ..Default::default()
        },
        ..Default::default()
    };
    let get = EmailGet {
        get: Get {
            ids: Some(ListOrRef::Ref(Ref::to(
                QUERY_ID,
                RefPath::root().field("ids"),
            ))),
            properties: Some(vec![
                "receivedAt".into(),
                "from".into(),
                "subject".into(),
            ]),
            ..Default::default()
        },
        ..Default::default()
    };

    let projection = client
        .request(vec![
            Invocation::with_id(MethodCall::EmailQuery(query), QUERY_ID),
            Invocation::with_id(MethodCall::EmailGet(get), GET_ID),
        ])
        .with_whatever_context(|source| format!("Could not query emails: {}", source))?;
    let mut outcomes = projection.into_outcomes().into_iter();

    let query = outcomes
        .next()
        .whatever_context("Server sent no query response")?;
    let query = primary(query)?
        .expect_email_query()
        .with_whatever_context(|source| format!("Could not query emails: {}", source))?;
    info!("Query matched {} emails", query.ids.len());

    let get = outcomes
        .next()
        .whatever_context("Server sent no email response")?;
    let emails = primary(get)?
        .expect_email_get()
        .with_whatever_context(|source| format!("Could not get emails: {}", source))?;

    // `Email/get` may answer in any order; keep the query's.
    for id in &query.ids {
        if let Some(email) = emails.list.iter().find(|email| email.id.as_ref() == Some(id)) {
            println!("{}", summary(email));
        }
    }
    Ok(())
}

fn summary(email: &Email) -> String {
    let received_at = email
        .received_at
        .map(|date| date.to_string())
        .unwrap_or_default();
    let from = email
        .mail_from
        .as_ref()
        .and_then(|addresses| addresses.first())
        .map(|address: &EmailAddress| address.name.clone().unwrap_or_else(|| address.email.clone()))
        .unwrap_or_default();
    format!(
        "{}\t{}\t{}",
        received_at,
        from,
        email.subject.as_deref().unwrap_or_default()
    )
}

fn echo(client: &Client<jmapc::transport::HttpTransport>, json: &str) -> Result<(), Whatever> {
    let arguments: Map<String, Value> = serde_json::from_str(json)
        .with_whatever_context(|source| format!("Argument is not a JSON object: {}", source))?;
    let outcome = client
        .method_call(MethodCall::CoreEcho(Echo(arguments)))
        .with_whatever_context(|source| format!("Could not echo: {}", source))?;
    let echoed = primary(outcome)?
        .expect_core_echo()
        .with_whatever_context(|source| format!("Could not echo: {}", source))?;
    let pretty = serde_json::to_string_pretty(&echoed)
        .with_whatever_context(|source| format!("Could not print response: {}", source))?;
    println!("{pretty}");
    Ok(())
}

fn main() {
    std::process::exit(match try_main() {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("error: {}", err);
            1
        }
    });
}
