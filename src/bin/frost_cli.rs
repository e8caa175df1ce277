use std::{
    error::Error,
    io::{self, Write},
    net::{SocketAddr, TcpStream},
};

use clap::Parser;
use frost::{
    Input, prompt,
    protocol::{ProtocolTransport, Request},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address of a running frost server
    #[arg(default_value = "127.0.0.1:3100")]
    address: SocketAddr,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let stream = TcpStream::connect(cli.address)?;
    let mut transport = ProtocolTransport::new(stream);

    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        let input = match prompt(stdin.lock(), stdout.lock()) {
            Ok(input) => input,
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                eprintln!("error: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let args = match input {
            Input::Exit => break,
            Input::Empty => continue,
            Input::Args(args) => args,
        };

        transport.write_request(&Request::from_args(&args))?;
        let resp = transport.read_response()?;

        let mut out = stdout.lock();
        writeln!(out, "{resp}")?;
        out.flush()?;
    }

    Ok(())
}
