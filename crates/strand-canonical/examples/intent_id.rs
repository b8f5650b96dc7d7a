use base64::Engine;
use serde_json::json;
use strand_canonical::{compute_content_id, payload_ref, Canonicalizer, ContentDomain};

fn main() {
    let payload = b"swap 10 SOL -> USDC";
    let preimage = json!({
        "actor": "acct:alice",
        "token": "1",
        "payload": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload),
    });

    match compute_content_id(ContentDomain::Intent, &preimage, &Canonicalizer::default()) {
        Ok(id) => {
            println!("intent_id   {id}");
            println!("payload_ref {}", payload_ref(payload));
        }
        Err(err) => {
            eprintln!("intent id computation failed: {}", err);
            std::process::exit(1);
        }
    }
}
