use super::*;
use crate::virtual_machine::render::BrowseConfig;
use crate::virtual_machine::resource::MemResource;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const FLAG_COUNT: u32 = 8;

fn new_vm(res: MemResource, budget: usize) -> Vm<MemResource> {
    Vm::new(
        State::new(FLAG_COUNT),
        Cache::new(0),
        res,
        Page::new(budget, BrowseConfig::default()),
    )
}

/// Runs `code` as a fresh turn and stores the rest as pending code.
fn run_code(vm: &mut Vm<MemResource>, code: Vec<u8>) {
    let rest = vm.run(&code).expect("vm run failed");
    vm.state_mut().set_code(rest);
}

fn start(vm: &mut Vm<MemResource>, node: &str) -> String {
    run_code(vm, Program::new().mv(node).into_bytes());
    vm.render().expect("render failed")
}

/// Feeds client input against the pending code and renders.
fn turn(vm: &mut Vm<MemResource>, input: &str) -> String {
    vm.state_mut().set_input(input).unwrap();
    let code = vm.state_mut().take_code();
    run_code(vm, code);
    vm.render().expect("render failed")
}

fn catch_node(res: MemResource) -> MemResource {
    res.with_code(CATCH_NODE, Program::new().halt().into_bytes())
        .with_template(CATCH_NODE, "invalid input")
}

fn counting_entry(res: MemResource, sym: &str, calls: Arc<AtomicUsize>) -> MemResource {
    res.with_entry(sym, move |_, _, _| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ContentResult::new(format!("v{n}")))
    })
}

// ==================== Rendering ====================

#[test]
fn move_then_halt_renders_template() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_template("foo", "inky pinky blinky clyde");
    let mut vm = new_vm(res, 0);
    let code = Program::new().mv("foo").halt().into_bytes();
    assert!(vm.run(&code).unwrap().is_empty());
    assert_eq!(vm.render().unwrap(), "inky pinky blinky clyde");
    assert!(vm.state().get_flag(WAIT).unwrap());
}

#[test]
fn menu_items_follow_template() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_template("foo", "inky pinky blinky clyde");
    let mut vm = new_vm(res, 0);
    let code = Program::new()
        .mv("foo")
        .mout("0", "one")
        .mout("1", "two")
        .halt()
        .into_bytes();
    vm.run(&code).unwrap();
    assert_eq!(
        vm.render().unwrap(),
        "inky pinky blinky clyde\n0:one\n1:two"
    );
}

#[test]
fn menu_titles_resolve_through_resource() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_template("foo", "hi")
        .with_menu("my_account", "My account");
    let mut vm = new_vm(res, 0);
    let code = Program::new()
        .mv("foo")
        .mout("1", "my_account")
        .mout("2", "help")
        .halt()
        .into_bytes();
    vm.run(&code).unwrap();
    assert_eq!(vm.render().unwrap(), "hi\n1:My account\n2:help");
}

#[test]
fn render_only_when_dirty() {
    let res = MemResource::new()
        .with_code("foo", Program::new().halt().into_bytes())
        .with_template("foo", "foo");
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "foo"), "foo");
    assert_eq!(vm.render().unwrap(), "");
}

#[test]
fn missing_template_is_error() {
    let res = MemResource::new().with_code("foo", Program::new().halt().into_bytes());
    let mut vm = new_vm(res, 0);
    run_code(&mut vm, Program::new().mv("foo").into_bytes());
    assert!(matches!(
        vm.render(),
        Err(VMError::Resource(ResourceError::NoTemplate(_)))
    ));
}

// ==================== Flags ====================

#[test]
fn content_flags_only_touch_user_range() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_entry("flagger", |_, _, _| {
            Ok(ContentResult::new("x").with_set(TERMINATE).with_set(9))
        });
    let mut vm = new_vm(res, 0);
    let code = Program::new().mv("foo").load("flagger", 0).halt().into_bytes();
    vm.run(&code).unwrap();
    assert!(!vm.state().get_flag(TERMINATE).unwrap());
    assert!(vm.state().get_flag(9).unwrap());
}

#[test]
fn state_dump_uses_caller_flag_names() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_entry("check", |_, _, _| Ok(ContentResult::new("").with_set(USER_START + 1)));
    let mut names = FlagNames::new();
    names.register(1, "blocked");
    let mut vm = new_vm(res, 0).with_flag_names(names);
    let code = Program::new().mv("foo").load("check", 0).halt().into_bytes();
    vm.run(&code).unwrap();

    let dump = vm.describe_state();
    assert!(dump.contains("blocked"), "{dump}");
    assert!(dump.contains("WAIT"), "{dump}");
    assert!(dump.starts_with("path [foo]"), "{dump}");

    let plain = new_vm(MemResource::new(), 0);
    assert_eq!(plain.describe_state(), plain.state().to_string());
    assert!(plain.flag_names().is_none());
}

#[test]
fn content_flag_reset() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_entry("clear", |_, _, _| Ok(ContentResult::new("").with_reset(USER_START)));
    let mut vm = new_vm(res, 0);
    vm.state_mut().set_flag(USER_START).unwrap();
    let code = Program::new().mv("foo").load("clear", 0).halt().into_bytes();
    vm.run(&code).unwrap();
    assert!(!vm.state().get_flag(USER_START).unwrap());
}

#[test]
fn content_flag_out_of_range_is_fatal() {
    let res = MemResource::new()
        .with_code("foo", Vec::new())
        .with_entry("bad", |_, _, _| Ok(ContentResult::new("").with_set(99)));
    let mut vm = new_vm(res, 0);
    let code = Program::new().mv("foo").load("bad", 0).halt().into_bytes();
    let err = vm.run(&code).unwrap_err();
    assert!(matches!(
        err.error,
        VMError::State(StateError::FlagOutOfRange { index: 99, .. })
    ));
    assert_eq!(err.remaining, Program::new().halt().into_bytes());
}

// ==================== Input matching ====================

fn two_branch_tree() -> MemResource {
    let root = Program::new()
        .mout("1", "foo")
        .mout("2", "bar")
        .halt()
        .incmp("1", "foo")
        .incmp("2", "bar")
        .into_bytes();
    catch_node(
        MemResource::new()
            .with_code("root", root)
            .with_template("root", "root")
            .with_code("foo", Program::new().halt().into_bytes())
            .with_template("foo", "this is foo")
            .with_code("bar", Program::new().halt().into_bytes())
            .with_template("bar", "this is bar"),
    )
}

#[test]
fn incmp_moves_to_matching_branch() {
    let mut vm = new_vm(two_branch_tree(), 0);
    assert_eq!(start(&mut vm, "root"), "root\n1:foo\n2:bar");
    assert_eq!(turn(&mut vm, "1"), "this is foo");
    assert_eq!(vm.state().path(), &["root".to_string(), "foo".to_string()]);
    assert_eq!(vm.cache().levels(), 3);
    assert!(vm.state().get_flag(INMATCH).unwrap());
    assert!(!vm.state().get_flag(READIN).unwrap());
}

#[test]
fn second_branch_matches() {
    let mut vm = new_vm(two_branch_tree(), 0);
    start(&mut vm, "root");
    assert_eq!(turn(&mut vm, "2"), "this is bar");
}

#[test]
fn unmatched_input_goes_to_catch_node() {
    let mut vm = new_vm(two_branch_tree(), 0);
    start(&mut vm, "root");
    assert_eq!(turn(&mut vm, "9"), "invalid input");
    assert_eq!(vm.state().location(), (CATCH_NODE, 0));
    assert!(!vm.state().get_flag(TERMINATE).unwrap());
}

#[test]
fn unmatched_input_at_catch_node_terminates() {
    let res = two_branch_tree().with_code(
        CATCH_NODE,
        Program::new().halt().incmp("0", "_").into_bytes(),
    );
    let mut vm = new_vm(res, 0);
    start(&mut vm, "root");
    turn(&mut vm, "9");
    turn(&mut vm, "9");
    assert!(vm.state().get_flag(TERMINATE).unwrap());
    assert_eq!(vm.state().location(), (CATCH_NODE, 0));
}

#[test]
fn wildcard_matches_any_input() {
    let res = MemResource::new()
        .with_code("root", Program::new().halt().incmp("*", "echo").into_bytes())
        .with_template("root", "say something")
        .with_code("echo", Program::new().load("said", 0).map("said").halt().into_bytes())
        .with_template("echo", "you said {{.said}}")
        .with_entry("said", |_, _, input| {
            Ok(ContentResult::new(String::from_utf8_lossy(input)))
        });
    let mut vm = new_vm(res, 0);
    start(&mut vm, "root");
    assert_eq!(turn(&mut vm, "hello"), "you said hello");
}

#[test]
fn code_without_halt_terminates() {
    let res = MemResource::new()
        .with_code("bye", Vec::new())
        .with_template("bye", "goodbye");
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "bye"), "goodbye");
    assert!(vm.state().get_flag(TERMINATE).unwrap());
    assert!(vm.run(&Program::new().mv("other").into_bytes()).unwrap().is_empty());
    assert_eq!(vm.state().location(), ("bye", 0));
}

#[test]
fn dead_runner_without_node() {
    let mut vm = new_vm(MemResource::new(), 0);
    vm.state_mut().set_input("2").unwrap();
    let err = vm.run(&Program::new().incmp("1", "foo").into_bytes()).unwrap_err();
    assert!(matches!(err.error, VMError::DeadRunner));
}

// ==================== Navigation ====================

fn three_level_tree() -> MemResource {
    MemResource::new()
        .with_code("root", Program::new().halt().incmp("1", "foo").into_bytes())
        .with_template("root", "root")
        .with_code(
            "foo",
            Program::new()
                .halt()
                .incmp("1", "bar")
                .incmp("0", "_")
                .into_bytes(),
        )
        .with_template("foo", "foo")
        .with_code("bar", Program::new().halt().incmp("0", "^").into_bytes())
        .with_template("bar", "bar")
}

#[test]
fn up_and_top_pop_cache_frames() {
    let mut vm = new_vm(three_level_tree(), 0);
    start(&mut vm, "root");
    assert_eq!(vm.cache().levels(), 2);
    turn(&mut vm, "1");
    assert_eq!(turn(&mut vm, "1"), "bar");
    assert_eq!(vm.cache().levels(), 4);

    assert_eq!(turn(&mut vm, "0"), "root");
    assert_eq!(vm.state().path(), &["root".to_string()]);
    assert_eq!(vm.cache().levels(), 2);

    assert_eq!(turn(&mut vm, "1"), "foo");
    assert_eq!(turn(&mut vm, "0"), "root");
    assert_eq!(vm.cache().levels(), 2);
}

#[test]
fn invalid_target_is_error() {
    let res = MemResource::new().with_code("root", Program::new().mv("x").into_bytes());
    let mut vm = new_vm(res, 0);
    let err = vm.run(&Program::new().mv("root").into_bytes()).unwrap_err();
    assert!(matches!(err.error, VMError::Input(_)));
}

#[test]
fn decode_error_returns_unexecuted_bytes() {
    let mut vm = new_vm(MemResource::new(), 0);
    let err = vm.run(&[0x00, 0x0D, 0x01]).unwrap_err();
    assert!(err.error.is_decode());
    assert_eq!(err.remaining, vec![0x00, 0x0D, 0x01]);
}

// ==================== Content loading ====================

fn account_node(res: MemResource) -> MemResource {
    res.with_code(
        "acct",
        Program::new()
            .load("balance", 32)
            .map("balance")
            .halt()
            .incmp("*", ".")
            .into_bytes(),
    )
    .with_template("acct", "balance: {{.balance}}")
}

#[test]
fn load_skips_cached_symbol() {
    let calls = Arc::new(AtomicUsize::new(0));
    let res = account_node(counting_entry(MemResource::new(), "balance", calls.clone()));
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "acct"), "balance: v1");
    assert_eq!(turn(&mut vm, "0"), "balance: v1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(vm.state().moves(), 2);
}

#[test]
fn load_failure_shows_error_and_continues() {
    let res = account_node(MemResource::new().with_entry("balance", |_, sym, _| {
        Err(ResourceError::entry(sym, "backend down"))
    }));
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "acct"), "balance: backend down\nbalance: ");
    assert!(vm.state().get_flag(LOADFAIL).unwrap());
    assert!(vm.page().error().is_none());
    assert!(vm.cache().get("balance").is_err());
}

#[test]
fn load_over_size_limit_fails_softly() {
    let res = account_node(MemResource::new().with_static("balance", &"9".repeat(40)));
    let mut vm = new_vm(res, 0);
    let out = start(&mut vm, "acct");
    assert!(out.starts_with("value for balance is 40 bytes"));
    assert!(vm.state().get_flag(LOADFAIL).unwrap());
}

#[test]
fn reload_refreshes_and_maps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let res = counting_entry(MemResource::new(), "val", calls)
        .with_code(
            "foo",
            Program::new().load("val", 10).reload("val").halt().into_bytes(),
        )
        .with_template("foo", "now {{.val}}");
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "foo"), "now v2");
}

#[test]
fn map_of_unloaded_symbol_is_error() {
    let res = MemResource::new().with_code("foo", Program::new().map("nope").into_bytes());
    let mut vm = new_vm(res, 0);
    let err = vm.run(&Program::new().mv("foo").into_bytes()).unwrap_err();
    assert!(matches!(err.error, VMError::Cache(CacheError::NotFound(_))));
}

#[test]
fn value_and_menu_sink_conflict() {
    let res = MemResource::new()
        .with_static("a", "x")
        .with_code(
            "foo",
            Program::new().load("a", 0).map("a").msink().halt().into_bytes(),
        );
    let mut vm = new_vm(res, 0);
    let err = vm.run(&Program::new().mv("foo").into_bytes()).unwrap_err();
    assert!(matches!(
        err.error,
        VMError::Render(RenderError::DoubleSink(_))
    ));
}

// ==================== Catch / Croak ====================

#[test]
fn catch_replaces_code_on_flag() {
    let res = MemResource::new()
        .with_entry("check", |_, _, _| Ok(ContentResult::new("").with_set(USER_START)))
        .with_code(
            "acct",
            Program::new()
                .load("check", 0)
                .catch("blocked", USER_START, true)
                .mout("1", "pay")
                .halt()
                .into_bytes(),
        )
        .with_code("blocked", Program::new().halt().into_bytes())
        .with_template("blocked", "account blocked");
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "acct"), "account blocked");
    assert_eq!(vm.state().location(), ("blocked", 0));
}

#[test]
fn catch_mode_zero_matches_clear_flag() {
    let res = MemResource::new()
        .with_code(
            "acct",
            Program::new()
                .catch("signup", USER_START + 1, false)
                .halt()
                .into_bytes(),
        )
        .with_code("signup", Program::new().halt().into_bytes())
        .with_template("signup", "please register");
    let mut vm = new_vm(res, 0);
    assert_eq!(start(&mut vm, "acct"), "please register");
}

#[test]
fn croak_restarts_session() {
    let res = MemResource::new()
        .with_entry("check", |_, _, _| Ok(ContentResult::new("c").with_set(USER_START)))
        .with_code("root", Program::new().halt().incmp("*", "foo").into_bytes())
        .with_template("root", "root")
        .with_code(
            "foo",
            Program::new()
                .load("check", 0)
                .croak(USER_START, true)
                .mout("1", "never")
                .halt()
                .into_bytes(),
        );
    let mut vm = new_vm(res, 0);
    start(&mut vm, "root");
    vm.state_mut().set_input("1").unwrap();
    let code = vm.state_mut().take_code();
    assert!(vm.run(&code).unwrap().is_empty());

    assert_eq!(vm.state().path(), &["root".to_string()]);
    assert!(!vm.state().get_flag(USER_START).unwrap());
    assert!(vm.state().get_flag(TERMINATE).unwrap());
    assert_eq!(vm.cache().levels(), 2);
    assert!(vm.cache().get("check").is_err());
    assert!(vm.page().menu().is_empty());
}

// ==================== Pagination ====================

fn list_node(budget: usize) -> Vm<MemResource> {
    let items = ["aaaa", "bbbb", "cccc", "dddd", "eeee", "ffff", "gggg", "hhhh", "iiii", "jjjj", "kkkk", "llll"]
        .join("\n");
    let code = Program::new()
        .load("items", 0)
        .map("items")
        .mnext("11", "next")
        .mprev("22", "prev")
        .halt()
        .incmp("11", ">")
        .incmp("22", "<")
        .into_bytes();
    let res = catch_node(
        MemResource::new()
            .with_static("items", &items)
            .with_code("list", code)
            .with_template("list", "list:\n{{.items}}"),
    );
    new_vm(res, budget)
}

#[test]
fn browse_pages_forward_and_back() {
    let mut vm = list_node(40);
    let first = start(&mut vm, "list");
    assert_eq!(first, "list:\naaaa\nbbbb\ncccc\ndddd\neeee\n11:next");

    let second = turn(&mut vm, "11");
    assert_eq!(second, "list:\nffff\ngggg\nhhhh\n11:next\n22:prev");
    assert_eq!(vm.state().location(), ("list", 1));

    let third = turn(&mut vm, "11");
    assert_eq!(third, "list:\niiii\njjjj\nkkkk\nllll\n22:prev");

    assert_eq!(turn(&mut vm, "22"), second);
    assert_eq!(turn(&mut vm, "22"), first);
    for page in [&first, &second, &third] {
        assert!(page.len() <= 40);
    }
}

#[test]
fn previous_on_first_page_falls_back() {
    let mut vm = list_node(40);
    start(&mut vm, "list");
    assert_eq!(turn(&mut vm, "22"), "invalid input");
    assert_eq!(vm.state().location(), (CATCH_NODE, 0));
}

#[test]
fn browse_past_last_page_redirects_to_catch() {
    let mut vm = list_node(40);
    start(&mut vm, "list");
    turn(&mut vm, "11");
    turn(&mut vm, "11");
    assert_eq!(turn(&mut vm, "11"), "invalid input");
    assert_eq!(vm.state().location(), (CATCH_NODE, 0));
    assert_eq!(vm.state().path(), &["list".to_string(), CATCH_NODE.to_string()]);
}
