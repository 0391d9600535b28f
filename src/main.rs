fn main() {
    let exit_code = match gnfresh::run::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("gnfresh: error: {:#}", err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
