use std::env;
use std::process;

use domain::adapters::memory_repo::{InMemoryDepositRepo, InMemorySearchIndex};
use domain::service::DepositService;
use domain::DepositDto;

fn print_usage() {
    eprintln!(
        "{}\n\nUsage:\n  domain create <bookingCode> <userId> <currencyCode>\n  domain search <query>\n\nNotes:\n  - This demo CLI uses in-memory storage; data is not persisted across runs.\n  - `search` seeds one sample deposit before querying.",
        domain::about()
    );
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1); // skip program name

    let Some(cmd) = args.next() else {
        print_usage();
        return Ok(());
    };

    let svc = DepositService::new(InMemoryDepositRepo::new(), InMemorySearchIndex::new());

    match cmd.as_str() {
        "create" => {
            let (Some(booking_code), Some(user_id), Some(currency_code)) =
                (args.next(), args.next(), args.next())
            else {
                return Err("create requires <bookingCode> <userId> <currencyCode>".into());
            };
            let user_id: i64 = user_id
                .parse()
                .map_err(|e| format!("invalid userId '{}': {}", user_id, e))?;
            let input = DepositDto {
                id: None,
                booking_code: Some(booking_code),
                user_id: Some(user_id),
                currency_code: Some(currency_code),
            };
            match svc.save(input) {
                Ok(saved) => {
                    println!("created: {}", saved);
                    Ok(())
                }
                Err(e) => Err(format!("create failed: {}", e)),
            }
        }
        "search" => {
            let Some(query) = args.next() else {
                return Err("missing <query> for search".into());
            };
            svc.save(DepositDto {
                id: None,
                booking_code: Some("AAAAAAAAAA".into()),
                user_id: Some(1),
                currency_code: Some("VND".into()),
            })
            .map_err(|e| format!("seed failed: {}", e))?;
            let hits = svc
                .search(&query)
                .map_err(|e| format!("search failed: {}", e))?;
            for hit in &hits {
                println!("{}", hit);
            }
            println!("{} hit(s)", hits.len());
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    if let Err(msg) = run() {
        eprintln!("error: {}", msg);
        process::exit(1);
    }
}
