// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON instead of a table"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print JSON lines instead of a table"),
    )
}

pub fn build_cli() -> Command {
    Command::new("ledgerlink")
        .about("Sync a local budgeting database with an external accounting service and reconcile budgets against realized amounts")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Initialize the local database"))
        .subcommand(
            Command::new("entity")
                .about("Manage accounting scopes and their credentials")
                .subcommand(
                    Command::new("add")
                        .about("Onboard an entity after validating its credential")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("token").long("token").required(true))
                        .arg(Arg::new("secret").long("secret")),
                )
                .subcommand(Command::new("list").about("List entities"))
                .subcommand(
                    Command::new("set-token")
                        .about("Replace an entity's credential")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("token").long("token").required(true))
                        .arg(Arg::new("secret").long("secret")),
                ),
        )
        .subcommand(
            Command::new("oauth")
                .about("OAuth authorization helpers")
                .subcommand(
                    Command::new("url")
                        .about("Print the authorize URL")
                        .arg(Arg::new("client-id").long("client-id").required(true))
                        .arg(Arg::new("redirect-uri").long("redirect-uri").required(true))
                        .arg(Arg::new("scope").long("scope").required(true)),
                )
                .subcommand(
                    Command::new("exchange")
                        .about("Exchange an authorization code and store the tokens")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("code").long("code").required(true)),
                ),
        )
        .subcommand(
            Command::new("sync")
                .about("Synchronize reference data from the accounting service")
                .subcommand(
                    Command::new("coa")
                        .about("Full paged resync of the chart of accounts")
                        .arg(Arg::new("entity").long("entity").required(true)),
                )
                .subcommand(
                    Command::new("categories")
                        .about("Upsert categories from a JSON file")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("file").long("file").required(true)),
                )
                .subcommand(
                    Command::new("account")
                        .about("Push one account through the incremental channel")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("id").long("id").required(true)),
                )
                .subcommand(
                    Command::new("all")
                        .about("Resync the chart of accounts for every entity, sequentially")
                        .arg(
                            Arg::new("entities")
                                .long("entities")
                                .help("Comma-separated entity names; all entities when omitted"),
                        ),
                )
                .subcommand(
                    Command::new("history")
                        .about("Show the append-only sync attempt ledger")
                        .arg(Arg::new("entity").long("entity")),
                ),
        )
        .subcommand(
            Command::new("budget")
                .about("Maintain local budgets and their items")
                .subcommand(
                    Command::new("set")
                        .about("Set an account's allocated amount in a budget")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("period").long("period").required(true))
                        .arg(Arg::new("account").long("account").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("description").long("description")),
                )
                .subcommand(
                    Command::new("list")
                        .about("List budget items")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("period").long("period")),
                ),
        )
        .subcommand(
            Command::new("realization")
                .about("Reconcile budgets against realized amounts")
                .subcommand(
                    Command::new("record")
                        .about("Ingest a realized amount into the local feed cache")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("account").long("account").required(true))
                        .arg(Arg::new("period").long("period").required(true))
                        .arg(Arg::new("amount").long("amount").required(true)),
                )
                .subcommand(json_flags(
                    Command::new("report")
                        .about("Budget-vs-realized records grouped by budget and period")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("period").long("period"))
                        .arg(Arg::new("type").long("type"))
                        .arg(Arg::new("budget").long("budget")),
                ))
                .subcommand(json_flags(
                    Command::new("summary")
                        .about("Entity-wide totals across filtered records")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("period").long("period"))
                        .arg(Arg::new("type").long("type"))
                        .arg(Arg::new("budget").long("budget")),
                )),
        )
        .subcommand(
            Command::new("export")
                .about("Export grouped realization data")
                .subcommand(
                    Command::new("realization")
                        .arg(Arg::new("entity").long("entity").required(true))
                        .arg(Arg::new("period").long("period"))
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .default_value("csv")
                                .help("csv or json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(
            Command::new("watch")
                .about("Subscribe to table changes while running a resync")
                .arg(Arg::new("entity").long("entity").required(true)),
        )
        .subcommand(Command::new("doctor").about("Check local data for inconsistencies"))
}
