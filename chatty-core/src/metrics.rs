// ABOUTME: Relay counters recorded through the metrics facade
// ABOUTME: No exporter is installed here; the binary decides where they go

use metrics::counter;

pub fn record_relayed(recipients: usize) {
    counter!("chatty_messages_relayed_total").increment(1);
    counter!("chatty_outbound_messages_total").increment(recipients as u64);
}

pub fn record_rejected() {
    counter!("chatty_senders_rejected_total").increment(1);
}

pub fn record_directive(name: &'static str) {
    counter!("chatty_directives_total", "directive" => name).increment(1);
}

pub fn record_alias_change() {
    counter!("chatty_alias_changes_total").increment(1);
}

pub fn record_send_failure() {
    counter!("chatty_send_failures_total").increment(1);
}
