#[macro_use]
extern crate afl;
use acolyte::Account;

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(pickled) = std::str::from_utf8(data) {
            let _ = Account::from_pickle(pickled, b"fuzz key");
        }
    });
}
