use osport_resolve::AddrQuery;

use crate::cmd::ResolveArgs;
use crate::exit::{resolve_error, CliResult, SUCCESS};
use crate::output::{print_endpoints, OutputFormat};

pub fn run(args: ResolveArgs, format: OutputFormat) -> CliResult<i32> {
    let mut query = AddrQuery::new(&args.node)
        .with_family(args.family.into())
        .with_kind(args.kind.into())
        .numeric_host(args.numeric)
        .numeric_service(args.numeric)
        .all_families(args.all)
        .v4_mapped(args.v4_mapped);
    if let Some(service) = &args.service {
        query = query.with_service(service);
    }

    let list = osport_resolve::resolve(&query)
        .map_err(|err| resolve_error("resolution failed", err))?;
    print_endpoints(&list, format);

    Ok(SUCCESS)
}
