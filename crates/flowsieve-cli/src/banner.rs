pub fn print_banner() {
    println!(
        "  {} v{} -- firewall log analyser + condensed rule suggester",
        console::style("flowsieve").cyan().bold(),
        flowsieve_core::VERSION,
    );
    println!();
}
