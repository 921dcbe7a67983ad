#[macro_use]
extern crate afl;
use acolyte::Account;

fn main() {
    fuzz!(|data: &[u8]| {
        let _ = Account::unpickle(data);
    });
}
