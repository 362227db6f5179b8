//! # depgraph
//!
//! Dependency-graph extraction for .NET code.
//!
//! Turns a solution, a project or a compiled module into a stream of
//! graph items: namespace, type and member nodes, plus the links between
//! them (inheritance, signatures, calls, member access).
//!
//! ## Key Features
//!
//! - **Two backends**: compiled metadata + IL, or C# source via tree-sitter
//! - **Canonical names**: one hierarchical name per symbol across both backends
//! - **Staged and parallel**: open, references, types, members
//! - **Streaming**: items flow through an unbounded channel as they are found
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use depgraph::{collect_items, ItemGraph, ParseOptions};
//! use std::path::Path;
//!
//! let (items, summary) = collect_items(Path::new("App.sln"), &ParseOptions::default())?;
//! let graph = ItemGraph::from_items(items);
//! println!("{summary}\n{}", graph.stats());
//! # Ok::<(), depgraph::GraphError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod monitor;
pub mod names;
pub mod parser;
pub mod query;
pub mod solution;
pub mod walker;

// Re-exports for convenience
pub use config::{DepgraphConfig, ModuleFilter, ParseMode, ParseOptions};
pub use error::{GraphError, Result};

// Graph re-exports
pub use graph::{
    collect_items, item_channel, join_parse, parse, parse_with_cancel, spawn_parse, GraphStats,
    Item, ItemGraph, ItemReceiver, ItemSender, Link, LinkKind, MemberKind, Node, NodeKind,
    SourceLocation,
};
pub use monitor::{newest_data_time, relevant_files};
pub use parser::InputKind;
pub use query::{SourceLocator, SourceText};
pub use solution::{CancelToken, ParseSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::binary::tests::{async_run, build_image, foo_calls_baz, public_method, test_type};
    use crate::parser::source::tests::FOO_CALLS_BAZ;
    use std::path::{Path, PathBuf};

    fn write(path: &Path, text: impl AsRef<[u8]>) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }

    fn node<'a>(items: &'a [Item], name: &str) -> Option<&'a Node> {
        items.iter().filter_map(Item::as_node).find(|n| n.name == name)
    }

    fn has_link(items: &[Item], source: &str, target: &str, target_kind: NodeKind, kind: LinkKind) -> bool {
        items
            .iter()
            .filter_map(Item::as_link)
            .any(|l| l.source == source && l.target == target && l.target_kind == target_kind && l.kind == kind)
    }

    fn assert_hierarchy(items: &[Item]) {
        for n in items.iter().filter_map(Item::as_node) {
            if !n.parent.is_empty() {
                assert!(names::is_strict_prefix(&n.parent, &n.name), "{} under {}", n.name, n.parent);
                assert!(node(items, &n.parent).is_some(), "parent of {} never emitted", n.name);
            }
        }
        let graph = ItemGraph::from_items(items.to_vec());
        assert!(graph.orphans().is_empty());
    }

    fn assert_foo_calls_baz(items: &[Item]) {
        let module = node(items, "mod").expect("module node");
        assert_eq!(module.kind, NodeKind::Module);
        assert_eq!(module.parent, "");
        let foo = node(items, "mod.N.Foo").expect("Foo");
        assert_eq!((foo.parent.as_str(), foo.kind), ("mod.N", NodeKind::Type));
        let bar = node(items, "mod.N.Foo.Bar()").expect("Bar");
        assert_eq!((bar.parent.as_str(), bar.kind), ("mod.N.Foo", NodeKind::Member));
        assert!(node(items, "mod.N.Baz").is_some());
        assert!(node(items, "mod.N.Baz.Qux()").is_some());
        assert!(has_link(items, "mod.N.Foo.Bar()", "mod.N.Baz.Qux()", NodeKind::Member, LinkKind::Call));
        assert_hierarchy(items);
    }

    #[test]
    fn test_foo_calls_baz_from_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.dll");
        write(&path, build_image("mod", &["System.Runtime"], &foo_calls_baz()));

        let (items, summary) = collect_items(&path, &ParseOptions::default()).unwrap();
        assert_eq!(summary.modules, vec!["mod".to_string()]);
        assert_foo_calls_baz(&items);
    }

    #[test]
    fn test_async_body_from_binary_is_attributed_to_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.dll");
        write(&path, build_image("mod", &["System.Runtime"], &async_run()));

        let (items, _) = collect_items(&path, &ParseOptions::default()).unwrap();
        assert!(has_link(&items, "mod.N.Foo.Run()", "mod.N.Baz.Qux()", NodeKind::Member, LinkKind::Call));
        for item in &items {
            match item {
                Item::Node(n) => assert!(!n.name.contains("<Run>"), "{}", n.name),
                Item::Link(l) => assert!(!l.source.contains("<Run>") && !l.target.contains("<Run>")),
            }
        }
        assert_hierarchy(&items);
    }

    #[test]
    fn test_external_references_are_walked_under_externals() {
        let dir = tempfile::tempdir().unwrap();
        let mut foo = test_type("N", "Foo", vec![public_method("Bar", None)]);
        foo.interfaces = vec![("L", "IWidget")];
        let app = dir.path().join("App.dll");
        write(&app, build_image("App", &["Lib", "System.Runtime"], &[foo]));
        write(
            &dir.path().join("Lib.dll"),
            build_image("Lib", &["System.Runtime"], &[test_type("L", "IWidget", vec![public_method("Ping", None)])]),
        );

        let options = ParseOptions::default().with_external_references(true);
        let (items, summary) = collect_items(&app, &options).unwrap();
        assert_eq!(summary.modules, vec!["App".to_string()]);
        assert_eq!(summary.externals, vec!["Lib".to_string()]);

        let lib = node(&items, "$Externals.Lib").expect("external module");
        assert_eq!((lib.parent.as_str(), lib.kind), ("$Externals", NodeKind::External));
        assert!(node(&items, "$Externals.Lib.L.IWidget").is_some());
        assert!(node(&items, "$Externals.Lib.L.IWidget.Ping()").is_some());
        assert!(has_link(&items, "App", "$Externals.Lib", NodeKind::External, LinkKind::Reference));
        assert!(items
            .iter()
            .filter_map(Item::as_link)
            .any(|l| l.source == "App.N.Foo" && l.target == "$Externals.Lib.L.IWidget" && l.kind == LinkKind::Interface));
        assert_hierarchy(&items);

        // without the option the reference stays a plain external slot
        let (items, summary) = collect_items(&app, &ParseOptions::default()).unwrap();
        assert!(summary.externals.is_empty());
        assert!(node(&items, "$Externals.Lib.L.IWidget.Ping()").is_none());
    }

    #[test]
    fn test_foo_calls_baz_from_source() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("mod").join("mod.csproj");
        write(&project, "<Project Sdk=\"Microsoft.NET.Sdk\" />");
        write(&dir.path().join("mod").join("Foo.cs"), FOO_CALLS_BAZ);

        let (items, _) = collect_items(&project, &ParseOptions::source()).unwrap();
        assert_foo_calls_baz(&items);
        // the implicit default constructor is never linked
        assert!(!has_link(&items, "mod.N.Foo.Bar()", "mod.N.Baz", NodeKind::Type, LinkKind::Call));
        assert!(node(&items, "mod.N.Baz.#ctor()").is_none());
    }

    #[test]
    fn test_source_calls_pick_typed_overloads_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("mod").join("mod.csproj");
        write(&project, "<Project Sdk=\"Microsoft.NET.Sdk\" />");
        write(
            &dir.path().join("mod").join("App.cs"),
            r#"
namespace N {
    public class Log {
        public static void Write(int value) { }
        public static void Write(string text) { }
    }
    public class W { }
    public static class Ext {
        public static void Spin(this W w) { }
    }
    public class App {
        public void Run(W w) {
            Log.Write("x");
            w.Spin();
        }
    }
}
"#,
        );

        let (items, _) = collect_items(&project, &ParseOptions::source()).unwrap();
        let run = "mod.N.App.Run(W)";
        assert!(has_link(&items, run, "mod.N.Log.Write(String)", NodeKind::Member, LinkKind::Call));
        assert!(!has_link(&items, run, "mod.N.Log.Write(Int32)", NodeKind::Member, LinkKind::Call));
        assert!(has_link(&items, run, "mod.N.Ext.Spin(W)", NodeKind::Member, LinkKind::Call));
        assert_hierarchy(&items);
    }

    #[test]
    fn test_solution_skips_project_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let sln = dir.path().join("App.sln");
        write(
            &sln,
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Built\", \"Built\\Built.csproj\", \"{A1}\"\nEndProject\n\
             Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Unbuilt\", \"Unbuilt\\Unbuilt.csproj\", \"{B2}\"\nEndProject\n",
        );
        write(&dir.path().join("Built").join("Built.csproj"), "<Project />");
        write(
            &dir.path().join("Built").join("bin").join("Debug").join("Built.dll"),
            build_image("Built", &["System.Runtime"], &foo_calls_baz()),
        );
        write(&dir.path().join("Unbuilt").join("Unbuilt.csproj"), "<Project />");

        let (items, summary) = collect_items(&sln, &ParseOptions::default()).unwrap();
        assert_eq!(summary.modules, vec!["Built".to_string()]);
        assert_eq!(summary.skipped_projects, vec!["Unbuilt".to_string()]);
        assert_eq!(node(&items, "App").map(|n| n.kind), Some(NodeKind::Solution));
        assert!(node(&items, "App.Built.N.Foo.Bar()").is_some());
        assert!(items.iter().filter_map(Item::as_node).all(|n| !n.name.contains("Unbuilt")));
        assert_hierarchy(&items);
    }

    #[test]
    fn test_single_project_without_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("Lone.csproj");
        write(&project, "<Project />");
        let err = collect_items(&project, &ParseOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "project Lone has no build output");
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let err = collect_items(Path::new("/nonexistent/App.dll"), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, GraphError::ModuleNotFound(_)));
    }

    #[test]
    fn test_cross_project_source_solution() {
        let dir = tempfile::tempdir().unwrap();
        let sln = dir.path().join("App.sln");
        write(
            &sln,
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Cli\", \"Cli\\Cli.csproj\", \"{C1}\"\nEndProject\n\
             Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Core\", \"Core\\Core.csproj\", \"{C2}\"\nEndProject\n\
             Project(\"{2150E333-8FDC-42A3-9474-1A3956D46DE8}\") = \"Libs\", \"Libs\", \"{F1}\"\nEndProject\n\
             Global\n\tGlobalSection(NestedProjects) = preSolution\n\t\t{C2} = {F1}\n\tEndGlobalSection\nEndGlobal\n",
        );
        write(
            &dir.path().join("Cli").join("Cli.csproj"),
            "<Project><ItemGroup><ProjectReference Include=\"..\\Core\\Core.csproj\" /></ItemGroup></Project>",
        );
        write(
            &dir.path().join("Cli").join("Program.cs"),
            "using Core.Model;\nnamespace Cli\n{\n    public class Program\n    {\n        public void Main()\n        {\n            var widget = new Widget();\n            widget.Spin();\n        }\n    }\n}\n",
        );
        write(&dir.path().join("Core").join("Core.csproj"), "<Project />");
        write(
            &dir.path().join("Core").join("Widget.cs"),
            "namespace Core.Model\n{\n    /// <summary>Spins.</summary>\n    public class Widget\n    {\n        public void Spin() { }\n    }\n}\n",
        );

        let options = ParseOptions::source().with_debug_symbols(true);
        let (items, summary) = collect_items(&sln, &options).unwrap();
        assert_eq!(summary.modules.len(), 2);

        assert_eq!(node(&items, "App.Libs").map(|n| n.kind), Some(NodeKind::SolutionFolder));
        assert_eq!(node(&items, "App.Libs.Core").map(|n| n.parent.as_str()), Some("App.Libs"));
        assert!(has_link(&items, "App.Cli", "App.Libs.Core", NodeKind::Module, LinkKind::Reference));

        let widget = node(&items, "App.Libs.Core.Core.Model.Widget").expect("Widget");
        assert_eq!(widget.description.as_deref(), Some("Spins."));
        assert!(has_link(
            &items,
            "App.Cli.Cli.Program.Main()",
            "App.Libs.Core.Core.Model.Widget.Spin()",
            NodeKind::Member,
            LinkKind::Call
        ));
        assert_hierarchy(&items);

        let locator = SourceLocator::from_items(&items);
        let program = dir.path().join("Cli").join("Program.cs");
        assert_eq!(
            locator.node_for_file_path(&program, 8).unwrap(),
            "App.Cli.Cli.Program.Main()"
        );
        let source = locator.get_source("App.Cli.Cli.Program.Main()").unwrap();
        assert_eq!(source.path, program);
        assert_eq!(source.line, 6);
        assert!(source.text.contains("widget.Spin()"));
    }

    #[test]
    fn test_dedup_is_scoped_to_each_member() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("mod.csproj");
        write(&project, "<Project />");
        write(
            &dir.path().join("A.cs"),
            "public class B { public static void X() { } }\n\
             public class A\n{\n    public void M() { B.X(); B.X(); }\n    public void N() { B.X(); B.X(); }\n}\n",
        );

        let (items, _) = collect_items(&project, &ParseOptions::source()).unwrap();
        let to_x: Vec<&Link> = items
            .iter()
            .filter_map(Item::as_link)
            .filter(|l| l.target == "mod.B.X()")
            .collect();
        assert_eq!(to_x.len(), 2);
        let sources: Vec<&str> = to_x.iter().map(|l| l.source.as_str()).collect();
        assert!(sources.contains(&"mod.A.M()"));
        assert!(sources.contains(&"mod.A.N()"));
    }

    #[test]
    fn test_relevant_files_for_solution() {
        let dir = tempfile::tempdir().unwrap();
        let sln = dir.path().join("App.sln");
        write(
            &sln,
            "Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Core\", \"Core\\Core.csproj\", \"{C2}\"\nEndProject\n",
        );
        write(&dir.path().join("Core").join("Core.csproj"), "<Project />");
        write(&dir.path().join("Core").join("A.cs"), "class A {}");

        let files = relevant_files(&sln, &ParseOptions::source()).unwrap();
        let expected: Vec<PathBuf> = vec![
            sln.clone(),
            dir.path().join("Core").join("A.cs"),
            dir.path().join("Core").join("Core.csproj"),
        ];
        assert_eq!(files, expected);
        assert!(newest_data_time(&sln, &ParseOptions::source()).unwrap().is_some());
    }
}
