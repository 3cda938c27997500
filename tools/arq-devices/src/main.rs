use ascii_table::{Align, AsciiTable};
use arq_modem::{supported_input_cards, supported_output_cards};

fn main() {
    // On some platforms enumerating devices emits junk to the terminal
    // (https://github.com/RustAudio/cpal/issues/384), so enumerate first and print last.
    let input_cards = supported_input_cards();
    let output_cards = supported_output_cards();

    println!("\nDetected sound cards offering an 8 kHz mono 16-bit config:");
    generate_table(&input_cards, &output_cards);
}

fn generate_table(input_cards: &[String], output_cards: &[String]) {
    let mut merged: Vec<&str> = input_cards
        .iter()
        .chain(output_cards.iter())
        .map(|s| s.as_str())
        .collect();
    merged.sort();
    merged.dedup();
    let yes = "OK";
    let no = "";
    let data = merged.into_iter().map(|c| {
        [
            c,
            if input_cards.iter().any(|s| s == c) {
                yes
            } else {
                no
            },
            if output_cards.iter().any(|s| s == c) {
                yes
            } else {
                no
            },
        ]
    });

    let mut table = AsciiTable::default();
    table.column(0).set_header("CARD").set_align(Align::Left);
    table.column(1).set_header("INPUT").set_align(Align::Center);
    table.column(2).set_header("OUTPUT").set_align(Align::Center);
    table.print(data);
}
