#[test]
fn repro() {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;
    let xml = "<outer><Inner>&lt;Event val=&quot;1&quot;/&gt;</Inner></outer>";
    let mf
= xml;
    let mut reader = Reader::from_str(mf);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(ref t)) => {
                eprintln!("bytes={:?}", String::from_utf8_lossy(t));
            }
            Ok(Event::Eof) => break,
            Err(e) => { eprintln!("err {:?}", e); break; }
            _ => {}
        }
        buf.clear();
    }
}
