use std::env;
use std::fs;
use std::process::ExitCode;

fn usage(program: &str) {
    eprintln!("usage: {program} <input-elf> <output-object>");
}

fn run(input: &str, output: &str) -> delink::Result<()> {
    let bytes = fs::read(input)?;
    let dst = delink::run(&bytes)?;
    fs::write(output, dst)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("delink");

    let [_, input, output] = args.as_slice() else {
        usage(program);
        return ExitCode::from(1);
    };

    match run(input, output) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("delink: {err}");
            ExitCode::from(2)
        }
    }
}
