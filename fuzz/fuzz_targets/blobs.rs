#![no_main]

use cilblob::metadata::{
    context::ModuleContext,
    customattributes::{parse_custom_attribute_data, AttributeCtor},
    marshalling::parse_marshalling_descriptor,
    security::parse_permission_set,
    signatures::{parse_method_signature, parse_signature, parse_type_spec_signature},
};
use cilblob::Token;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let context = ModuleContext::default();

    let _ = parse_signature(data, &context);
    let _ = parse_type_spec_signature(data, &context);
    let _ = parse_marshalling_descriptor(data, &context);
    let _ = parse_permission_set(data, &context);

    // The first bytes double as the constructor signature of the attribute blob that follows
    if let Some((&split, rest)) = data.split_first() {
        let split = usize::from(split).min(rest.len());
        let (ctor_sig, blob) = rest.split_at(split);
        if let Ok(signature) = parse_method_signature(ctor_sig, &context) {
            let ctor = AttributeCtor::new(Token::new(0x0A00_0001), signature);
            let _ = parse_custom_attribute_data(blob, &ctor, &context);
        }
    }
});
