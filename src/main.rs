fn main() {
    std::process::exit(tether::cli::run());
}
