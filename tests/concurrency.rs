mod common;

use std::sync::Arc;
use std::thread;

use common::global;
use idlc::{parse_fragment, CheckerConfig, Session, SymtabPool, Value};

const BODY: &str = "
Bits<8> acc = 0;
for (Bits<8> i = 0; i < N; i++) {
  acc = acc + add_one(i);
}
";

fn body_for(n: u8) -> String {
    format!("Bits<8> N = {n};\n{BODY}")
}

#[test]
fn sessions_share_one_global_scope_across_threads() {
    let global = global();

    let handles: Vec<_> = (1..=8u8)
        .map(|n| {
            let global = Arc::clone(&global);
            thread::spawn(move || {
                let program = parse_fragment("t.idl", &body_for(n)).unwrap();
                let mut session = Session::new(global);
                session.type_check(&program).unwrap();
                session.execute(&program).unwrap();
                (n, session.var_value("acc"))
            })
        })
        .collect();

    for handle in handles {
        let (n, acc) = handle.join().unwrap();
        let expected: i128 = (1..=i128::from(n)).sum();
        assert_eq!(acc, Some(Value::Int(expected)));
    }
}

#[test]
fn pooled_tables_come_back_clean() {
    let global = global();
    let pool = SymtabPool::new(Arc::clone(&global), 2);

    thread::scope(|scope| {
        for n in 1..=6u8 {
            let pool = &pool;
            scope.spawn(move || {
                let program = parse_fragment("t.idl", &body_for(n)).unwrap();
                let mut table = pool.acquire();
                let acc = Session::pooled(&mut table, CheckerConfig::default(), |session| {
                    session.type_check(&program).unwrap();
                    session.execute(&program).unwrap();
                    session.var_value("acc")
                });
                let expected: i128 = (1..=i128::from(n)).sum();
                assert_eq!(acc, Some(Value::Int(expected)));
            });
        }
    });

    assert!(pool.idle() <= pool.capacity());
    let table = pool.acquire();
    assert_eq!(table.levels(), 1);
    assert!(table.get("acc").is_none());
    assert!(table.get("LIMIT").is_some());
}
