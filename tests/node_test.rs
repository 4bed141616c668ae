use hvdac_proto::{Config, LinearCompensation, Master, Node, Reading, Receiver, Reply};

/// Sans-io round trip: frames from the master go straight into the node.
#[test]
fn node_main_loop() {
    let config = Config::default();
    let master = Master::new(config);
    let mut node = Node::new(config);

    let send = master.initialize(3, LinearCompensation::UpTo16V).unwrap();
    assert_eq!(node.receive_data(send.as_slice()), b"OK\n");

    for (channel, volts) in [1.5, 3.0, 4.5].iter().enumerate() {
        let send = master.set_voltage(channel, *volts).unwrap();
        assert_eq!(node.receive_data(send.as_slice()), b"OK\n");
    }

    let send = master.read_voltage(2).unwrap();
    let reply = node.receive_data(send.as_slice());
    let volts = send.data_sent().receive_data(&reply).voltage().unwrap();
    assert!((volts - 4.5).abs() < 1e-4);

    let send = master.read_all();
    let reply = node.receive_data(send.as_slice());
    match send.data_sent().receive_data(&reply) {
        Reply::Decoded(Reading::All(volts)) => assert_eq!(volts.len(), 3),
        other => panic!("Unexpected reply {:?}", other),
    }
}

#[test]
fn node_byte_at_a_time() {
    let config = Config::default();
    let master = Master::new(config);
    let mut node = Node::new(config);

    let send = master.set_sync(&[1.0, 2.0, 3.0]).unwrap();
    let mut reply = Vec::new();
    for byte in send.as_slice() {
        reply.extend(node.receive_data(&[*byte]));
    }
    assert_eq!(reply, b"OK\n");
    assert_eq!(node.output(0), Some(101_018));
}

#[test]
fn node_error_reply_decodes_raw() {
    let config = Config::default();
    let master = Master::new(config);
    // the node only knows two channels, so the host's broadcast address is out of range
    let mut node = Node::new(Config::new(config.reference(), 2).unwrap());

    let send = master.read_clear(3).unwrap();
    let reply = node.receive_data(send.as_slice());
    assert_eq!(
        send.data_sent().receive_data(&reply),
        Reply::Raw(b"ERR\n".to_vec())
    );
}
