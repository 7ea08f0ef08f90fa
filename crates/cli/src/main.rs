//! # CLI - TideCask Interactive Shell
//!
//! A REPL-style command-line interface for the TideCask store. Reads
//! commands from stdin, executes them against the store, and prints
//! results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value      Insert or update a key-value pair
//! GET key            Look up a key (prints value or "(nil)")
//! DEL key            Delete a key (tombstones the record)
//! KEYS               List all keys in ascending order
//! COUNT              Print the number of live keys
//! SYNC               Persist the index snapshot and flush segments
//! STATS              Print store debug info
//! EXIT / QUIT        Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! TIDECASK_ROOT   Root data directory   (default: "data")
//! TIDECASK_NAME   Store name            (default: "tidecask")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! TideCask started (dir=data/tidecask, segments=1, keys=0)
//! > PUT name Alice
//! OK
//! > GET name
//! Alice
//! > DEL name
//! OK
//! > GET name
//! (nil)
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use std::io::{self, BufRead, Write};
use store::{Store, StoreError};

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let root = env_or("TIDECASK_ROOT", "data");
    let name = env_or("TIDECASK_NAME", "tidecask");

    let store = Store::load(&root, &name)?;
    println!(
        "TideCask started (dir={}, segments={}, keys={})",
        store.db_dir().display(),
        store.segment_count(),
        store.key_count()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let mut parts = line.trim().splitn(3, ' ');
        let cmd = parts.next().unwrap_or("").to_ascii_uppercase();

        match cmd.as_str() {
            "" => {}
            "PUT" => match (parts.next(), parts.next()) {
                (Some(key), Some(value)) => match store.put(key, value) {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR {}", e),
                },
                _ => println!("usage: PUT key value"),
            },
            "GET" => match parts.next() {
                Some(key) => match store.get(key) {
                    Ok(value) => println!("{}", value),
                    Err(StoreError::NotFound) => println!("(nil)"),
                    Err(e) => println!("ERR {}", e),
                },
                None => println!("usage: GET key"),
            },
            "DEL" => match parts.next() {
                Some(key) => match store.delete(key) {
                    Ok(()) => println!("OK"),
                    Err(StoreError::NotFound) => println!("(nil)"),
                    Err(e) => println!("ERR {}", e),
                },
                None => println!("usage: DEL key"),
            },
            "KEYS" => match store.list_keys() {
                Ok(keys) => {
                    for key in &keys {
                        println!("{}", key);
                    }
                    println!("({} keys)", keys.len());
                }
                Err(e) => println!("ERR {}", e),
            },
            "COUNT" => println!("{}", store.key_count()),
            "SYNC" => match store.sync() {
                Ok(()) => println!("OK"),
                Err(e) => println!("ERR {}", e),
            },
            "STATS" => println!("{:?}", store),
            "EXIT" | "QUIT" => break,
            other => println!("unknown command: {}", other),
        }
    }

    store.close()?;
    println!("bye");
    Ok(())
}
