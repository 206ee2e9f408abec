use clap::{Parser, Subcommand};
use spyglass::interp::value::Value;
use spyglass::stack::registry;
use spyglass::{bridge, console, record_frame};
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attach an interactive console to a running bridge
    Connect {
        /// Bridge port, pid-derived default when omitted
        port: Option<u16>,
        #[arg(long, default_value_t = String::from("127.0.0.1"))]
        host: String,
    },
    /// Run a demo workload hosting an embedded bridge
    Serve {
        /// Preferred port, pid-derived default when omitted
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Connect { port, host } => {
            console::connect(&host, port.unwrap_or_else(spyglass::default_port))
        }
        Command::Serve { port } => serve(port.unwrap_or_else(spyglass::default_port)),
    }
}

/// Demo host: a couple of instrumented threads so an attached console has
/// stacks, locals and globals to look at.
fn serve(preferred_port: u16) -> anyhow::Result<()> {
    let server = bridge::start(preferred_port)?;
    println!("spyglass console server on port {}", server.port);
    println!("attach with: spy connect {}", server.port);

    registry().publish_global("greeting", Value::Str("hello from the demo host".to_string()));

    thread::Builder::new()
        .name("crunch".to_string())
        .spawn(demo_crunch)?;
    thread::Builder::new()
        .name("ticker".to_string())
        .spawn(demo_ticker)?;

    let frame = record_frame!("serve");
    let mut beats: i64 = 0;
    loop {
        beats += 1;
        frame.at_line(line!());
        frame.publish_local("beats", Value::Int(beats));
        thread::sleep(Duration::from_millis(500));
    }
}

fn demo_crunch() {
    let frame = record_frame!("demo_crunch");
    let mut round: i64 = 0;
    loop {
        round += 1;
        frame.publish_local("round", Value::Int(round));
        demo_crunch_step(round);
    }
}

fn demo_crunch_step(round: i64) {
    let frame = record_frame!("demo_crunch_step");
    let total: i64 = (0..100_000).sum();
    frame.publish_local("total", Value::Int(total.wrapping_mul(round)));
    thread::sleep(Duration::from_millis(250));
}

fn demo_ticker() {
    let frame = record_frame!("demo_ticker");
    let mut ticks: i64 = 0;
    loop {
        ticks += 1;
        frame.at_line(line!());
        frame.publish_local("ticks", Value::Int(ticks));
        thread::sleep(Duration::from_millis(100));
    }
}
