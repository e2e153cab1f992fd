use sms_relay::{sign_call, verify_bridge_call};

fn main() {
    let body = br#"{"method":"onSmsReceived","args":{"sender":"+1555","message":"hi","timestamp":"1000"}}"#;
    let secret = b"supersecret";
    let signed = sign_call(secret, "onSmsReceived", body, 1_700_000_000);

    let headers = signed.headers();
    let pairs = headers.iter().map(|(name, value)| (*name, value.as_str()));

    match verify_bridge_call(pairs, body, secret, 300, 1_700_000_200) {
        Ok(call) => println!("verified {} with {}", call.method, call.args),
        Err(err) => println!("rejected: {}", err),
    }
}
