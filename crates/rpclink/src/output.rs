use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct ReplyOutput<'a> {
    pub target: &'a str,
    pub service_method: &'a str,
    pub codec_type: &'a str,
    pub reply_size: usize,
    pub reply: String,
    pub elapsed_ms: f64,
}

impl<'a> ReplyOutput<'a> {
    pub fn new(
        target: &'a str,
        service_method: &'a str,
        codec_type: &'a str,
        reply: &[u8],
        elapsed_ms: f64,
    ) -> Self {
        Self {
            target,
            service_method,
            codec_type,
            reply_size: reply.len(),
            reply: payload_preview(reply),
            elapsed_ms,
        }
    }
}

pub fn print_reply(out: &ReplyOutput<'_>, raw: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Pretty => {
            println!(
                "{} -> {} ({} bytes, {:.2} ms)",
                out.service_method, out.reply, out.reply_size, out.elapsed_ms
            );
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

#[derive(Serialize)]
pub struct ProbeOutput<'a> {
    pub target: &'a str,
    pub protocol: &'a str,
    pub address: &'a str,
    pub codec_type: &'a str,
    pub magic_number: u32,
    pub connect_timeout_ms: u128,
    pub connect_ms: f64,
    pub connected: bool,
}

pub fn print_probe(out: &ProbeOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(out),
        OutputFormat::Pretty => {
            println!("target:          {}", out.target);
            println!("protocol:        {}", out.protocol);
            println!("address:         {}", out.address);
            println!("codec:           {}", out.codec_type);
            println!("magic:           {:#x}", out.magic_number);
            println!("connect timeout: {} ms", out.connect_timeout_ms);
            println!("connected in:    {:.2} ms", out.connect_ms);
        }
    }
}

fn print_json<T: Serialize>(out: &T) {
    println!(
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn millis(elapsed: std::time::Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
