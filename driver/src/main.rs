mod cli;
mod command;
mod drain;
mod interpreter;
mod interrupt;
mod synth;

#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() {
    let code = match cli::run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:?}");
            1
        }
    };

    // stdin de tokio puede quedar con una lectura bloqueada en otro hilo
    // (Ctrl-C en el prompt); salimos sin esperar a que el runtime la suelte
    std::process::exit(code);
}
