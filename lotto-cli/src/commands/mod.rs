use anyhow::{bail, Context};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::config::MIN_WINNING_MATCHES;
use lotto_core::{AccountId, Amount, ReferralCode, RoundIndex, Seed, TicketId};
use lotto_engine::{random_seed, DrawParams, LotteryService, MockOracle, RandomnessOracle};

const DEFAULT_KEY_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Subcommand)]
pub enum Commands {
    /// Show the price of a ticket
    Price {
        /// Ticket numbers (1-90)
        #[arg(required = true)]
        numbers: Vec<u8>,
    },
    /// Buy a ticket
    Buy {
        /// Buyer account
        account: String,
        /// Ticket numbers (1-90)
        #[arg(required = true)]
        numbers: Vec<u8>,
        /// Referral code (hex, 32 bytes)
        #[arg(short, long)]
        referral: Option<String>,
        /// Amount paid; defaults to the exact price
        #[arg(short, long)]
        pay: Option<u64>,
    },
    /// Claim a referral code for an account
    ClaimCode {
        /// Owning account
        account: String,
        /// Referral code (hex, 32 bytes)
        code: String,
    },
    /// Request the weekly draw from the oracle
    Draw {
        /// Seed for the built-in oracle (hex, 32 bytes); random when omitted
        #[arg(short, long)]
        seed: Option<String>,
        /// Leave the request pending instead of fulfilling it immediately
        #[arg(long)]
        no_fulfill: bool,
        #[arg(long, default_value_t = 1)]
        subscription_id: u64,
        #[arg(long, default_value = DEFAULT_KEY_HASH)]
        key_hash: String,
    },
    /// Deliver a seed for the pending draw request
    Fulfill {
        /// Seed (hex, 32 bytes); random when omitted
        seed: Option<String>,
    },
    /// Find winners and close the current round
    Settle,
    /// Show the current round and pool
    Status,
    /// Show a round's draw and winners
    Round {
        /// Round index; current round when omitted
        index: Option<RoundIndex>,
    },
    /// Show a ticket
    Ticket { id: TicketId },
    /// List an account's tickets
    Tickets {
        account: String,
        /// Only tickets of this round
        #[arg(short, long)]
        round: Option<RoundIndex>,
    },
    /// Show an account's withdrawable balance and referral codes
    Balance { account: String },
    /// Withdraw an account's balance
    Withdraw { account: String },
    /// Stop ticket sales and draw requests
    Pause,
    /// Resume ticket sales and draw requests
    Unpause,
}

pub async fn run(
    command: Commands,
    service: &LotteryService,
    oracle: &MockOracle,
) -> anyhow::Result<()> {
    match command {
        Commands::Price { numbers } => show_price(service, &numbers),
        Commands::Buy {
            account,
            numbers,
            referral,
            pay,
        } => buy_ticket(service, &account, &numbers, referral.as_deref(), pay).await,
        Commands::ClaimCode { account, code } => claim_code(service, &account, &code).await,
        Commands::Draw {
            seed,
            no_fulfill,
            subscription_id,
            key_hash,
        } => {
            let params = DrawParams {
                subscription_id,
                key_hash,
            };
            request_draw(service, oracle, &params, seed.as_deref(), no_fulfill).await
        }
        Commands::Fulfill { seed } => fulfill_draw(service, oracle, seed.as_deref()).await,
        Commands::Settle => settle(service).await,
        Commands::Status => show_status(service),
        Commands::Round { index } => show_round(service, index),
        Commands::Ticket { id } => show_ticket(service, id),
        Commands::Tickets { account, round } => list_tickets(service, &account, round),
        Commands::Balance { account } => show_balance(service, &account),
        Commands::Withdraw { account } => withdraw(service, &account).await,
        Commands::Pause => {
            service.pause().await?;
            println!("Lottery paused");
            Ok(())
        }
        Commands::Unpause => {
            service.unpause().await?;
            println!("Lottery unpaused");
            Ok(())
        }
    }
}

fn parse_seed(seed: Option<&str>) -> anyhow::Result<Seed> {
    match seed {
        Some(hex) => hex.parse().context("Invalid seed"),
        None => Ok(random_seed()),
    }
}

fn format_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_ids(ids: &[TicketId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn show_price(service: &LotteryService, numbers: &[u8]) -> anyhow::Result<()> {
    let price = service.read(|engine| engine.ticket_price(numbers))?;
    println!("Price for [{}]: {}", format_numbers(numbers), price);
    Ok(())
}

async fn buy_ticket(
    service: &LotteryService,
    account: &str,
    numbers: &[u8],
    referral: Option<&str>,
    pay: Option<u64>,
) -> anyhow::Result<()> {
    let referral = referral
        .map(|code| code.parse::<ReferralCode>())
        .transpose()
        .context("Invalid referral code")?;
    let payment = match pay {
        Some(units) => Amount::from_units(units),
        None => service.read(|engine| engine.ticket_price(numbers))?,
    };

    let buyer = AccountId::from(account);
    let id = service
        .buy_ticket(&buyer, referral, numbers, payment)
        .await?;
    let round = service.read(|engine| engine.current_round());
    tracing::debug!("Ticket {} recorded for {} in round {}", id, buyer, round);

    println!("Ticket {} bought by {} for round {}", id, buyer, round);
    Ok(())
}

async fn claim_code(service: &LotteryService, account: &str, code: &str) -> anyhow::Result<()> {
    let code: ReferralCode = code.parse().context("Invalid referral code")?;
    service
        .claim_referral_code(code, &AccountId::from(account))
        .await?;
    println!("Referral code {} now belongs to {}", code, account);
    Ok(())
}

async fn request_draw(
    service: &LotteryService,
    oracle: &MockOracle,
    params: &DrawParams,
    seed: Option<&str>,
    no_fulfill: bool,
) -> anyhow::Result<()> {
    let seed = parse_seed(seed)?;
    let handle = service.request_draw(params).await?;
    println!(
        "Round {} draw requested, oracle request {}",
        handle.round, handle.request_id
    );

    if no_fulfill {
        println!("Run `lotto fulfill` to deliver the seed");
        return Ok(());
    }

    let drawn = service
        .fulfill_draw(oracle.account(), handle.request_id, &seed)
        .await?;
    println!("Seed: {}", seed);
    println!("Drawn numbers: {}", drawn);
    Ok(())
}

async fn fulfill_draw(
    service: &LotteryService,
    oracle: &MockOracle,
    seed: Option<&str>,
) -> anyhow::Result<()> {
    let seed = parse_seed(seed)?;
    let Some(request_id) = service.read(|engine| engine.pending_request()) else {
        bail!("No draw request is pending");
    };

    let drawn = service
        .fulfill_draw(oracle.account(), request_id, &seed)
        .await?;
    println!("Seed: {}", seed);
    println!("Drawn numbers: {}", drawn);
    Ok(())
}

async fn settle(service: &LotteryService) -> anyhow::Result<()> {
    let closed = service.settle().await?;
    tracing::info!("Round {} closed, round {} open", closed, closed + 1);
    println!("Round {} settled", closed);
    show_round(service, Some(closed))
}

fn show_status(service: &LotteryService) -> anyhow::Result<()> {
    service.read(|engine| {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Field", "Value"]);
        table.add_row(vec!["Round".to_string(), engine.current_round().to_string()]);
        table.add_row(vec![
            "State".to_string(),
            format!("{:?}", engine.round_state()),
        ]);
        table.add_row(vec!["Paused".to_string(), engine.is_paused().to_string()]);
        table.add_row(vec!["Can draw".to_string(), engine.can_draw().to_string()]);
        table.add_row(vec![
            "Next draw".to_string(),
            engine.next_draw_time().to_rfc3339(),
        ]);
        table.add_row(vec!["Tickets sold".to_string(), engine.ticket_count().to_string()]);
        table.add_row(vec!["Prize pool".to_string(), engine.prize_pool().to_string()]);
        table.add_row(vec![
            "Owed to accounts".to_string(),
            engine.outstanding_liabilities().to_string(),
        ]);
        if let Some(request_id) = engine.pending_request() {
            table.add_row(vec!["Pending request".to_string(), request_id.to_string()]);
        }
        println!("{}", table);
    });
    Ok(())
}

fn show_round(service: &LotteryService, index: Option<RoundIndex>) -> anyhow::Result<()> {
    let data = service.read(|engine| {
        engine.draw_data(index.unwrap_or_else(|| engine.current_round()))
    })?;

    println!("Round {} ({:?})", data.round, data.state);
    match &data.numbers {
        Some(numbers) => println!("Drawn numbers: {}", format_numbers(numbers)),
        None => println!("Not drawn yet"),
    }
    if let Some(drawn_at) = data.drawn_at {
        println!("Drawn at: {}", drawn_at.to_rfc3339());
    }
    println!("Prize pool snapshot: {}", data.prize_pool_snapshot);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Matches", "Winning tickets", "Payout each"]);
    for (slot, winners) in data.winners.iter().enumerate() {
        table.add_row(vec![
            (slot + MIN_WINNING_MATCHES).to_string(),
            format_ids(winners),
            data.payout_per_winner[slot].to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn show_ticket(service: &LotteryService, id: TicketId) -> anyhow::Result<()> {
    let ticket = service.read(|engine| engine.ticket(id).cloned())?;
    println!("Ticket {}", ticket.id);
    println!("Owner: {}", ticket.owner);
    println!("Round: {}", ticket.round);
    println!("Numbers: {}", ticket.numbers);
    Ok(())
}

fn list_tickets(
    service: &LotteryService,
    account: &str,
    round: Option<RoundIndex>,
) -> anyhow::Result<()> {
    let owner = AccountId::from(account);
    service.read(|engine| {
        let ids = match round {
            Some(round) => engine.ticket_ids_for_round(&owner, round),
            None => engine.ticket_ids(&owner),
        };

        if ids.is_empty() {
            println!("No tickets for {}", owner);
            return;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Ticket", "Round", "Numbers"]);
        for ticket in ids.iter().filter_map(|&id| engine.ticket(id).ok()) {
            table.add_row(vec![
                ticket.id.to_string(),
                ticket.round.to_string(),
                ticket.numbers.to_string(),
            ]);
        }
        println!("{}", table);
    });
    Ok(())
}

fn show_balance(service: &LotteryService, account: &str) -> anyhow::Result<()> {
    let owner = AccountId::from(account);
    service.read(|engine| {
        println!("Withdrawable: {}", engine.pending_balance(&owner));
        let codes: Vec<String> = (0..)
            .map_while(|i| engine.referral_code_of(&owner, i).ok())
            .map(|code| code.to_string())
            .collect();
        if !codes.is_empty() {
            println!("Referral codes:");
            for code in codes {
                println!("  {}", code);
            }
        }
    });
    Ok(())
}

async fn withdraw(service: &LotteryService, account: &str) -> anyhow::Result<()> {
    let amount = service.withdraw(&AccountId::from(account)).await?;
    tracing::info!("Withdrawal of {} for {} sent", amount, account);
    println!("Withdrew {} for {}", amount, account);
    Ok(())
}
