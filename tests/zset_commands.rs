mod common;

use common::{spawn_server, Resp, TestClient};

fn pairs(resp: Resp) -> Vec<(String, String)> {
    let items = match resp {
        Resp::Arr(items) => items,
        other => panic!("expected array response, got {:?}", other),
    };
    assert_eq!(items.len() % 2, 0, "member/score pairs come in twos");
    items
        .chunks(2)
        .map(|pair| match pair {
            [Resp::Str(member), Resp::Str(score)] => (member.clone(), score.clone()),
            other => panic!("expected two strings, got {:?}", other),
        })
        .collect()
}

#[test]
fn zadd_zrange_end_to_end() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    assert_eq!(
        client.query(&["ZADD", "z", "1", "a", "2", "b", "1.5", "c"]),
        Resp::Int(3)
    );
    assert_eq!(
        pairs(client.query(&["ZRANGE", "z", "0", "-1"])),
        vec![
            ("a".to_string(), "1".to_string()),
            ("c".to_string(), "1.5".to_string()),
            ("b".to_string(), "2".to_string()),
        ]
    );

    // Updating c's score counts as zero added and repositions it first.
    assert_eq!(client.query(&["ZADD", "z", "0.5", "c"]), Resp::Int(0));
    assert_eq!(
        pairs(client.query(&["ZRANGE", "z", "0", "0"])),
        vec![("c".to_string(), "0.5".to_string())]
    );
}

#[test]
fn zrange_against_string_key_is_rejected() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    assert_eq!(client.query(&["ZADD", "z", "1", "a"]), Resp::Int(1));
    match client.query(&["GET", "z"]) {
        Resp::Err(code, msg) => {
            assert_eq!(code, 1);
            assert!(msg.contains("wrong kind of value"), "got: {}", msg);
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[test]
fn zrem_reports_removed_count() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    client.query(&["ZADD", "z", "1", "a", "2", "b", "3", "c"]);
    assert_eq!(client.query(&["ZREM", "z", "a", "ghost", "c"]), Resp::Int(2));
    assert_eq!(
        pairs(client.query(&["ZRANGE", "z", "0", "-1"])),
        vec![("b".to_string(), "2".to_string())]
    );
    assert_eq!(client.query(&["ZREM", "missing", "a"]), Resp::Int(0));
}

#[test]
fn zadd_rejects_non_numeric_scores() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    match client.query(&["ZADD", "z", "abc", "member"]) {
        Resp::Err(code, msg) => {
            assert_eq!(code, 1);
            assert!(msg.contains("not a valid float"), "got: {}", msg);
        }
        other => panic!("expected error, got {:?}", other),
    }
    // Nothing was created.
    assert_eq!(pairs(client.query(&["ZRANGE", "z", "0", "-1"])), vec![]);
}

#[test]
fn zrange_windows_and_negative_indices() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    for (score, member) in [("10", "m0"), ("20", "m1"), ("30", "m2"), ("40", "m3")] {
        client.query(&["ZADD", "z", score, member]);
    }

    let listed = pairs(client.query(&["ZRANGE", "z", "1", "2"]));
    assert_eq!(
        listed.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
        vec!["m1", "m2"]
    );

    let listed = pairs(client.query(&["ZRANGE", "z", "-1", "-1"]));
    assert_eq!(
        listed.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
        vec!["m3"]
    );

    assert_eq!(pairs(client.query(&["ZRANGE", "z", "3", "1"])), vec![]);
    assert_eq!(pairs(client.query(&["ZRANGE", "z", "9", "12"])), vec![]);
    assert_eq!(pairs(client.query(&["ZRANGE", "ghost", "0", "-1"])), vec![]);
}

#[test]
fn large_set_keeps_rank_order() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    // Insert in shuffled score order; ZRANGE must come back sorted.
    for i in 0..100u32 {
        let score = ((i * 37) % 100).to_string();
        let member = format!("m{:03}", (i * 37) % 100);
        assert_eq!(client.query(&["ZADD", "big", &score, &member]), Resp::Int(1));
    }
    let listed = pairs(client.query(&["ZRANGE", "big", "0", "-1"]));
    assert_eq!(listed.len(), 100);
    for (i, (member, score)) in listed.iter().enumerate() {
        assert_eq!(member, &format!("m{:03}", i));
        assert_eq!(score, &i.to_string());
    }

    // Rank windows line up with absolute positions.
    let listed = pairs(client.query(&["ZRANGE", "big", "42", "44"]));
    assert_eq!(
        listed.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
        vec!["m042", "m043", "m044"]
    );
}

#[test]
fn del_then_recreate_as_string() {
    let addr = spawn_server();
    let mut client = TestClient::connect(addr);

    client.query(&["ZADD", "k", "1", "a"]);
    assert_eq!(client.query(&["DEL", "k"]), Resp::Int(1));
    assert_eq!(client.query(&["SET", "k", "plain"]), Resp::Nil);
    assert_eq!(client.query(&["GET", "k"]), Resp::Str("plain".into()));
}
